use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::balance::{self, BalanceError};
use crate::clock::Clock;
use crate::domain::bill::{Debtor, NationalId, PaymentMethod};
use crate::negotiation::engine::{transition, NegotiationError};
use crate::negotiation::states::{
    NegotiationConfig, NegotiationEvent, NegotiationState, SessionReply, SessionStep,
};

/// Collaborator failure on the ledger side. The session treats the lookup as
/// one atomic call; whatever went wrong is carried as an opaque description.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("ledger lookup failed: {0}")]
pub struct LedgerError(pub String);

/// Read-only debtor ledger. Implementations live outside the core; the
/// call must be idempotent.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, LedgerError>;
}

/// Recoverable, user-visible outcomes. None of these mutate session state;
/// the transport re-prompts and the dialogue continues.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionSignal {
    #[error("no debtor record matched the supplied identifier")]
    NotFound,
    #[error(transparent)]
    LookupFailed(#[from] LedgerError),
    #[error("installment count {requested} is outside 1..={max_installments}")]
    OutOfRange { requested: u32, max_installments: u32 },
    #[error("unrecognized payment method `{supplied}`")]
    InvalidMethod { supplied: String },
    #[error("input does not apply at step {step:?}")]
    UnexpectedInput { step: SessionStep },
    #[error(transparent)]
    InvalidInput(#[from] BalanceError),
}

impl From<NegotiationError> for SessionSignal {
    fn from(value: NegotiationError) -> Self {
        match value {
            NegotiationError::OutOfRange { requested, max_installments } => {
                Self::OutOfRange { requested, max_installments }
            }
            NegotiationError::UnexpectedEvent { step } => Self::UnexpectedInput { step },
        }
    }
}

/// Owns one `NegotiationState` per chat identity and is the only entry into
/// the state machine. A per-key async mutex serializes events for one
/// identity in arrival order; distinct identities proceed concurrently.
pub struct SessionDispatcher<S, C> {
    ledger: Arc<S>,
    clock: C,
    config: NegotiationConfig,
    sessions: Mutex<HashMap<String, Arc<Mutex<NegotiationState>>>>,
}

impl<S, C> SessionDispatcher<S, C>
where
    S: LedgerStore,
    C: Clock,
{
    pub fn new(ledger: Arc<S>, clock: C, config: NegotiationConfig) -> Self {
        Self { ledger, clock, config, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    async fn session_handle(&self, session_key: &str) -> Arc<Mutex<NegotiationState>> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_key.to_owned()).or_default().clone()
    }

    /// Looks the identifier up, computes the statement, and moves the
    /// session to review. The session is untouched on `NotFound` and
    /// `LookupFailed`.
    pub async fn on_identifier_submitted(
        &self,
        session_key: &str,
        raw_identifier: &str,
    ) -> Result<SessionReply, SessionSignal> {
        let handle = self.session_handle(session_key).await;
        let mut state = handle.lock().await;

        if state.step != SessionStep::AwaitingIdentifier {
            return Err(SessionSignal::UnexpectedInput { step: state.step });
        }

        let national_id = NationalId::new(raw_identifier);
        let Some(debtor) = self.ledger.find_by_national_id(&national_id).await? else {
            return Err(SessionSignal::NotFound);
        };

        let statement = balance::statement(
            &debtor.bills,
            self.clock.now(),
            self.config.aging_threshold_days,
        )?;

        let outcome = transition(
            &state,
            &NegotiationEvent::DebtReviewed { national_id, statement },
            &self.config,
        )?;
        *state = outcome.state;
        Ok(outcome.reply)
    }

    pub async fn on_installment_choice_submitted(
        &self,
        session_key: &str,
        count: u32,
    ) -> Result<SessionReply, SessionSignal> {
        let handle = self.session_handle(session_key).await;
        let mut state = handle.lock().await;

        let outcome =
            transition(&state, &NegotiationEvent::InstallmentsRequested { count }, &self.config)?;
        *state = outcome.state;
        Ok(outcome.reply)
    }

    pub async fn on_payment_method_submitted(
        &self,
        session_key: &str,
        raw_method: &str,
    ) -> Result<SessionReply, SessionSignal> {
        let handle = self.session_handle(session_key).await;
        let mut state = handle.lock().await;

        let method: PaymentMethod = raw_method
            .parse()
            .map_err(|error: crate::domain::bill::UnknownPaymentMethod| {
                SessionSignal::InvalidMethod { supplied: error.supplied }
            })?;

        let outcome =
            transition(&state, &NegotiationEvent::PaymentMethodSelected { method }, &self.config)?;
        *state = outcome.state;
        Ok(outcome.reply)
    }

    pub async fn on_reset(&self, session_key: &str) -> Result<SessionReply, SessionSignal> {
        let handle = self.session_handle(session_key).await;
        let mut state = handle.lock().await;

        let outcome = transition(&state, &NegotiationEvent::ResetRequested, &self.config)?;
        *state = outcome.state;
        Ok(outcome.reply)
    }

    /// Current step for one identity, if a session exists. Observability
    /// helper; not a state-machine entry point.
    pub async fn current_step(&self, session_key: &str) -> Option<SessionStep> {
        let handle = {
            let sessions = self.sessions.lock().await;
            sessions.get(session_key).cloned()
        };
        match handle {
            Some(handle) => Some(handle.lock().await.step),
            None => None,
        }
    }
}
