pub mod bill;

pub use bill::{Bill, BillId, Debtor, NationalId, PaymentMethod, UnknownPaymentMethod};
