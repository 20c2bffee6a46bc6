use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillId(pub String);

/// Debtor lookup key (CPF in the source deployment). Stored as an opaque,
/// pre-validated string; the ingestion side owns formatting rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NationalId(pub String);

impl NationalId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single payable debt instrument. `amount` is the face value; penalty and
/// interest are derived at query time and never written back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debtor {
    pub national_id: NationalId,
    pub bills: Vec<Bill>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    Card,
    Boleto,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Pix, Self::Card, Self::Boleto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::Card => "card",
            Self::Boleto => "boleto",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown payment method `{supplied}` (expected pix|card|boleto)")]
pub struct UnknownPaymentMethod {
    pub supplied: String,
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pix" => Ok(Self::Pix),
            "card" | "cartao" => Ok(Self::Card),
            "boleto" => Ok(Self::Boleto),
            other => Err(UnknownPaymentMethod { supplied: other.to_owned() }),
        }
    }
}
