use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use cobranca_core::clock::Clock;
use cobranca_core::negotiation::states::{NegotiationFlow, SessionReply, SessionStep};
use cobranca_core::session::{LedgerStore, SessionDispatcher, SessionSignal};

use crate::commands::{classify_input, parse_installment_count, ChatCommand, UserInput};
use crate::render;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message(_) => ChatEventType::Message,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

impl MessageEvent {
    /// Sessions are scoped to the sender within a chat, so a group chat
    /// never mixes two users' negotiations.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.chat_id, self.user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message handler failure: {0}")]
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct UpdateDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl UpdateDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Transport-facing view of the negotiation core: the four state-machine
/// entry points plus the bits of context the renderer needs.
#[async_trait]
pub trait NegotiationService: Send + Sync {
    fn flow(&self) -> NegotiationFlow;

    async fn current_step(&self, session_key: &str) -> Option<SessionStep>;

    async fn identifier_submitted(
        &self,
        session_key: &str,
        raw_identifier: &str,
    ) -> Result<SessionReply, SessionSignal>;

    async fn installment_choice_submitted(
        &self,
        session_key: &str,
        count: u32,
    ) -> Result<SessionReply, SessionSignal>;

    async fn payment_method_submitted(
        &self,
        session_key: &str,
        raw_method: &str,
    ) -> Result<SessionReply, SessionSignal>;

    async fn reset(&self, session_key: &str) -> Result<SessionReply, SessionSignal>;
}

#[async_trait]
impl<S, C> NegotiationService for SessionDispatcher<S, C>
where
    S: LedgerStore,
    C: Clock,
{
    fn flow(&self) -> NegotiationFlow {
        self.config().flow
    }

    async fn current_step(&self, session_key: &str) -> Option<SessionStep> {
        SessionDispatcher::current_step(self, session_key).await
    }

    async fn identifier_submitted(
        &self,
        session_key: &str,
        raw_identifier: &str,
    ) -> Result<SessionReply, SessionSignal> {
        self.on_identifier_submitted(session_key, raw_identifier).await
    }

    async fn installment_choice_submitted(
        &self,
        session_key: &str,
        count: u32,
    ) -> Result<SessionReply, SessionSignal> {
        self.on_installment_choice_submitted(session_key, count).await
    }

    async fn payment_method_submitted(
        &self,
        session_key: &str,
        raw_method: &str,
    ) -> Result<SessionReply, SessionSignal> {
        self.on_payment_method_submitted(session_key, raw_method).await
    }

    async fn reset(&self, session_key: &str) -> Result<SessionReply, SessionSignal> {
        self.on_reset(session_key).await
    }
}

pub struct MessageHandler<N> {
    service: N,
}

impl<N> MessageHandler<N>
where
    N: NegotiationService,
{
    pub fn new(service: N) -> Self {
        Self { service }
    }

    fn respond(&self, result: Result<SessionReply, SessionSignal>) -> String {
        match result {
            Ok(reply) => render::reply_text(&reply, self.service.flow()),
            Err(signal) => render::signal_text(&signal),
        }
    }

    async fn free_text_reply(&self, session_key: &str, text: &str) -> String {
        let step =
            self.service.current_step(session_key).await.unwrap_or(SessionStep::AwaitingIdentifier);

        match step {
            SessionStep::AwaitingIdentifier => {
                self.respond(self.service.identifier_submitted(session_key, text).await)
            }
            SessionStep::AwaitingInstallmentChoice => match parse_installment_count(text) {
                Some(count) => self
                    .respond(self.service.installment_choice_submitted(session_key, count).await),
                None => "Reply with the number of installments, e.g. 3.".to_owned(),
            },
            SessionStep::AwaitingPaymentMethod => {
                self.respond(self.service.payment_method_submitted(session_key, text).await)
            }
            step @ (SessionStep::Reviewing | SessionStep::Completed) => {
                render::signal_text(&SessionSignal::UnexpectedInput { step })
            }
        }
    }
}

#[async_trait]
impl<N> EventHandler for MessageHandler<N>
where
    N: NegotiationService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let session_key = event.session_key();
        let text = match classify_input(&event.text) {
            UserInput::Command(ChatCommand::Start) => {
                self.respond(self.service.reset(&session_key).await)
            }
            UserInput::Command(ChatCommand::Help) => render::help_text(self.service.flow()),
            UserInput::Command(ChatCommand::Negotiate { count: Some(count) }) => {
                self.respond(self.service.installment_choice_submitted(&session_key, count).await)
            }
            UserInput::Command(ChatCommand::Negotiate { count: None }) => {
                "Usage: /renegociar N, where N is the number of installments.".to_owned()
            }
            UserInput::Command(ChatCommand::Unknown { verb }) => {
                format!("Unknown command `/{verb}`. Send /help for the available commands.")
            }
            UserInput::Text(text) if text.is_empty() => {
                self.free_text_reply(&session_key, "").await
            }
            UserInput::Text(text) => self.free_text_reply(&session_key, &text).await,
        };

        Ok(HandlerResult::Responded(OutboundMessage { chat_id: event.chat_id, text }))
    }
}

/// Stand-in service for a runner that has not been wired to a ledger yet.
#[derive(Default)]
pub struct NoopNegotiationService;

#[async_trait]
impl NegotiationService for NoopNegotiationService {
    fn flow(&self) -> NegotiationFlow {
        NegotiationFlow::MultiStep
    }

    async fn current_step(&self, _session_key: &str) -> Option<SessionStep> {
        None
    }

    async fn identifier_submitted(
        &self,
        _session_key: &str,
        _raw_identifier: &str,
    ) -> Result<SessionReply, SessionSignal> {
        Err(SessionSignal::NotFound)
    }

    async fn installment_choice_submitted(
        &self,
        _session_key: &str,
        _count: u32,
    ) -> Result<SessionReply, SessionSignal> {
        Err(SessionSignal::UnexpectedInput { step: SessionStep::AwaitingIdentifier })
    }

    async fn payment_method_submitted(
        &self,
        _session_key: &str,
        _raw_method: &str,
    ) -> Result<SessionReply, SessionSignal> {
        Err(SessionSignal::UnexpectedInput { step: SessionStep::AwaitingIdentifier })
    }

    async fn reset(&self, _session_key: &str) -> Result<SessionReply, SessionSignal> {
        Ok(SessionReply::SessionCleared)
    }
}

pub fn default_dispatcher() -> UpdateDispatcher {
    let mut dispatcher = UpdateDispatcher::new();
    dispatcher.register(MessageHandler::new(NoopNegotiationService));
    dispatcher
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use cobranca_core::clock::FixedClock;
    use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};
    use cobranca_core::negotiation::states::{NegotiationConfig, NegotiationFlow};
    use cobranca_core::session::SessionDispatcher;
    use cobranca_db::repositories::{DebtorRepository, InMemoryDebtorRepository};

    use super::{
        default_dispatcher, ChatEvent, EventContext, HandlerResult, MessageEvent, MessageHandler,
        UpdateDispatcher, UpdateEnvelope,
    };

    fn as_of() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("valid instant")
    }

    async fn seeded_ledger() -> Arc<InMemoryDebtorRepository> {
        let repo = Arc::new(InMemoryDebtorRepository::default());
        repo.save(Debtor {
            national_id: NationalId::new("11122233344"),
            bills: vec![Bill {
                id: BillId("b-1".to_owned()),
                amount: Decimal::from(500),
                due_date: (as_of() - Duration::days(40)).date_naive(),
                paid: false,
            }],
        })
        .await
        .expect("seed saves");
        repo
    }

    async fn chat_dispatcher(flow: NegotiationFlow) -> UpdateDispatcher {
        let sessions = SessionDispatcher::new(
            seeded_ledger().await,
            FixedClock(as_of()),
            NegotiationConfig { aging_threshold_days: 30, flow },
        );

        let mut dispatcher = UpdateDispatcher::new();
        dispatcher.register(MessageHandler::new(sessions));
        dispatcher
    }

    fn message(update_id: i64, text: &str) -> UpdateEnvelope {
        UpdateEnvelope {
            update_id,
            event: ChatEvent::Message(MessageEvent {
                chat_id: 77,
                user_id: 42,
                text: text.to_owned(),
            }),
        }
    }

    async fn reply_text(dispatcher: &UpdateDispatcher, update_id: i64, text: &str) -> String {
        let result = dispatcher
            .dispatch(&message(update_id, text), &EventContext::default())
            .await
            .expect("dispatch succeeds");
        match result {
            HandlerResult::Responded(outbound) => {
                assert_eq!(outbound.chat_id, 77);
                outbound.text
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multi_step_dialogue_over_chat_messages() {
        let dispatcher = chat_dispatcher(NegotiationFlow::MultiStep).await;

        let greeting = reply_text(&dispatcher, 1, "/start").await;
        assert!(greeting.contains("CPF"));

        let statement = reply_text(&dispatcher, 2, "11122233344").await;
        assert!(statement.contains("R$ 581.00"));
        assert!(statement.contains("up to 5 installments"));

        let accepted = reply_text(&dispatcher, 3, "5").await;
        assert!(accepted.contains("pix, card or boleto"));

        let plan = reply_text(&dispatcher, 4, "boleto").await;
        assert!(plan.contains("R$ 119.20"), "got: {plan}");
    }

    #[tokio::test]
    async fn single_command_dialogue_uses_the_explicit_command() {
        let dispatcher = chat_dispatcher(NegotiationFlow::SingleCommand).await;

        reply_text(&dispatcher, 1, "/start").await;
        let statement = reply_text(&dispatcher, 2, "11122233344").await;
        assert!(statement.contains("/renegociar"));

        // Free text does not negotiate in this flow.
        let hint = reply_text(&dispatcher, 3, "5").await;
        assert!(hint.contains("/renegociar"));

        let plan = reply_text(&dispatcher, 4, "/renegociar 5").await;
        assert!(plan.contains("R$ 119.20"), "got: {plan}");
    }

    #[tokio::test]
    async fn unknown_identifier_and_bad_choices_reprompt() {
        let dispatcher = chat_dispatcher(NegotiationFlow::MultiStep).await;

        let not_found = reply_text(&dispatcher, 1, "00000000000").await;
        assert!(not_found.contains("not found"));

        reply_text(&dispatcher, 2, "11122233344").await;

        let out_of_range = reply_text(&dispatcher, 3, "9").await;
        assert!(out_of_range.contains("between 1 and 5"));

        let not_a_number = reply_text(&dispatcher, 4, "many").await;
        assert!(not_a_number.contains("number of installments"));

        reply_text(&dispatcher, 5, "5").await;
        let bad_method = reply_text(&dispatcher, 6, "cash").await;
        assert!(bad_method.contains("pix, card, boleto"));
    }

    #[tokio::test]
    async fn start_resets_a_completed_negotiation() {
        let dispatcher = chat_dispatcher(NegotiationFlow::MultiStep).await;

        reply_text(&dispatcher, 1, "11122233344").await;
        reply_text(&dispatcher, 2, "2").await;
        reply_text(&dispatcher, 3, "pix").await;

        let finished = reply_text(&dispatcher, 4, "11122233344").await;
        assert!(finished.contains("/start"));

        let greeting = reply_text(&dispatcher, 5, "/start").await;
        assert!(greeting.contains("CPF"));

        let statement = reply_text(&dispatcher, 6, "11122233344").await;
        assert!(statement.contains("R$ 581.00"));
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let dispatcher = default_dispatcher();
        let envelope = UpdateEnvelope {
            update_id: 9,
            event: ChatEvent::Unsupported { event_type: "edited_message".to_owned() },
        };

        let result = dispatcher
            .dispatch(&envelope, &EventContext::default())
            .await
            .expect("dispatch succeeds");
        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 1);
    }
}
