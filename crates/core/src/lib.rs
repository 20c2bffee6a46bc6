pub mod balance;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod negotiation;
pub mod session;

pub use balance::{BalanceError, Classified, OverdueBill, Statement};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::bill::{Bill, BillId, Debtor, NationalId, PaymentMethod, UnknownPaymentMethod};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use negotiation::{
    installment_amount, transition, DebtSnapshot, InstallmentPlan, NegotiationConfig,
    NegotiationError, NegotiationEvent, NegotiationFlow, NegotiationState, SessionReply,
    SessionStep, TransitionOutcome,
};
pub use session::{LedgerError, LedgerStore, SessionDispatcher, SessionSignal};
