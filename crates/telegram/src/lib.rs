pub mod commands;
pub mod poller;
pub mod render;
pub mod updates;

pub use commands::{classify_input, parse_installment_count, ChatCommand, UserInput};
pub use poller::{
    HttpPollTransport, NoopPollTransport, PollTransport, PollingRunner, ReconnectPolicy,
    TransportError,
};
pub use updates::{
    ChatEvent, ChatEventType, EventContext, EventHandler, HandlerResult, MessageEvent,
    MessageHandler, NegotiationService, OutboundMessage, UpdateDispatcher, UpdateEnvelope,
};
