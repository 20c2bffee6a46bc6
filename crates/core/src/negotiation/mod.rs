pub mod engine;
pub mod states;

pub use engine::{installment_amount, transition, NegotiationError};
pub use states::{
    DebtSnapshot, InstallmentPlan, NegotiationConfig, NegotiationEvent, NegotiationFlow,
    NegotiationState, SessionReply, SessionStep, TransitionOutcome,
};
