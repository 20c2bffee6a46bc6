use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::Statement;
use crate::domain::bill::{NationalId, PaymentMethod};

/// Shape of the negotiation dialogue. Observed deployments differ: one takes
/// a single explicit `/renegociar N` command, the other walks the user
/// through installment count and then payment method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationFlow {
    SingleCommand,
    MultiStep,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationConfig {
    pub aging_threshold_days: i64,
    pub flow: NegotiationFlow,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self { aging_threshold_days: 30, flow: NegotiationFlow::MultiStep }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStep {
    #[default]
    AwaitingIdentifier,
    Reviewing,
    AwaitingInstallmentChoice,
    AwaitingPaymentMethod,
    Completed,
}

impl SessionStep {
    /// Position in the forward order. Steps only ever advance within one
    /// negotiation; reset is the single way back.
    pub fn rank(self) -> u8 {
        match self {
            Self::AwaitingIdentifier => 0,
            Self::Reviewing => 1,
            Self::AwaitingInstallmentChoice => 2,
            Self::AwaitingPaymentMethod => 3,
            Self::Completed => 4,
        }
    }
}

/// Ledger lookup result pinned to the session at review time. A later
/// negotiation never reuses these totals across a reset; a fresh lookup
/// recomputes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSnapshot {
    pub national_id: NationalId,
    pub statement: Statement,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationState {
    pub step: SessionStep,
    pub debt: Option<DebtSnapshot>,
    pub chosen_installments: Option<u32>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NegotiationEvent {
    DebtReviewed { national_id: NationalId, statement: Statement },
    InstallmentsRequested { count: u32 },
    PaymentMethodSelected { method: PaymentMethod },
    ResetRequested,
}

/// Presentation-neutral outcome payloads; the transport layer owns wording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionReply {
    /// Review result with open negotiation; `max_installments` comes with
    /// the embedded statement.
    Statement { statement: Statement },
    /// Review result with nothing overdue; the dialogue is over.
    SettledUp { statement: Statement },
    /// Installment count accepted, payment method still pending.
    InstallmentsAccepted { installments: u32, total_due: Decimal },
    /// Terminal payment plan.
    InstallmentPlan(InstallmentPlan),
    /// Reset acknowledged; the session is back at identifier intake.
    SessionCleared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub total_due: Decimal,
    pub installments: u32,
    pub payment_method: PaymentMethod,
    /// Full-precision quotient; round only when presenting.
    pub per_installment: Decimal,
}

impl InstallmentPlan {
    pub fn per_installment_rounded(&self) -> Decimal {
        self.per_installment.round_dp(2)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: SessionStep,
    pub to: SessionStep,
    pub state: NegotiationState,
    pub reply: SessionReply,
}
