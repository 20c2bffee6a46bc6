use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::bill::Bill;

/// Flat penalty applied once to any overdue bill: 1%.
fn flat_penalty_rate() -> Decimal {
    Decimal::new(1, 2)
}

/// Simple (non-compounding) interest accrued per day overdue: 0.33%.
fn daily_interest_rate() -> Decimal {
    Decimal::new(33, 4)
}

/// Fixed surcharge per bill overdue beyond the configured aging threshold.
fn aging_surcharge_fee() -> Decimal {
    Decimal::new(1000, 2)
}

/// Minimum value of a single installment; the installment cap is derived
/// from it.
fn minimum_installment_value() -> Decimal {
    Decimal::new(10000, 2)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("bill amount cannot be negative: {amount}")]
    NegativeAmount { amount: Decimal },
    #[error("days overdue cannot be negative: {days}")]
    NegativeDaysOverdue { days: i64 },
}

/// An unpaid bill whose due date has passed, with the derived correction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueBill {
    pub bill: Bill,
    pub days_overdue: i64,
    pub corrected_amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classified {
    pub active: Vec<Bill>,
    pub overdue: Vec<OverdueBill>,
}

/// The full balance picture for one debtor at one instant. Recomputed fresh
/// on every lookup; nothing here is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub active: Vec<Bill>,
    pub overdue: Vec<OverdueBill>,
    pub overdue_total: Decimal,
    pub aging_surcharge: Decimal,
    pub total_due: Decimal,
    pub max_installments: u32,
}

impl Statement {
    pub fn has_overdue(&self) -> bool {
        !self.overdue.is_empty()
    }
}

fn due_instant(due_date: NaiveDate) -> DateTime<Utc> {
    due_date.and_time(NaiveTime::MIN).and_utc()
}

fn age_in_days(due_date: NaiveDate, as_of: DateTime<Utc>) -> i64 {
    (as_of - due_instant(due_date)).num_days()
}

/// Partitions unpaid bills into active and overdue; paid bills are excluded
/// from both. A bill is overdue once its due date (midnight UTC) lies before
/// `as_of`, so a bill due today is already overdue with zero interest days.
pub fn classify(bills: &[Bill], as_of: DateTime<Utc>) -> Result<Classified, BalanceError> {
    let mut active = Vec::new();
    let mut overdue = Vec::new();

    for bill in bills {
        if bill.paid {
            continue;
        }

        if due_instant(bill.due_date) < as_of {
            let days_overdue = age_in_days(bill.due_date, as_of);
            let corrected_amount = corrected_amount(bill.amount, days_overdue)?;
            overdue.push(OverdueBill { bill: bill.clone(), days_overdue, corrected_amount });
        } else {
            active.push(bill.clone());
        }
    }

    Ok(Classified { active, overdue })
}

/// Face value plus 1% flat penalty plus 0.33% simple daily interest.
pub fn corrected_amount(amount: Decimal, days_overdue: i64) -> Result<Decimal, BalanceError> {
    if amount < Decimal::ZERO {
        return Err(BalanceError::NegativeAmount { amount });
    }
    if days_overdue < 0 {
        return Err(BalanceError::NegativeDaysOverdue { days: days_overdue });
    }

    let multiplier =
        Decimal::ONE + flat_penalty_rate() + daily_interest_rate() * Decimal::from(days_overdue);
    Ok(amount * multiplier)
}

/// Flat 10.00 per overdue bill aged at least `threshold_days` at `as_of`.
pub fn aging_surcharge(
    overdue: &[OverdueBill],
    as_of: DateTime<Utc>,
    threshold_days: i64,
) -> Decimal {
    let aged = overdue
        .iter()
        .filter(|entry| age_in_days(entry.bill.due_date, as_of) >= threshold_days)
        .count();

    Decimal::from(aged) * aging_surcharge_fee()
}

pub fn total_due(overdue: &[OverdueBill], surcharge: Decimal) -> Decimal {
    overdue.iter().map(|entry| entry.corrected_amount).sum::<Decimal>() + surcharge
}

/// `floor(total_due / 100)`. Zero means the debt is below the minimum
/// installment value and cannot be split.
pub fn max_installments(total_due: Decimal) -> u32 {
    if total_due < minimum_installment_value() {
        return 0;
    }

    (total_due / minimum_installment_value()).floor().to_u32().unwrap_or(u32::MAX)
}

/// Composes the engine operations into the bundle the negotiation session
/// consumes.
pub fn statement(
    bills: &[Bill],
    as_of: DateTime<Utc>,
    threshold_days: i64,
) -> Result<Statement, BalanceError> {
    let Classified { active, overdue } = classify(bills, as_of)?;
    let surcharge = aging_surcharge(&overdue, as_of, threshold_days);
    let overdue_total = overdue.iter().map(|entry| entry.corrected_amount).sum::<Decimal>();
    let total = total_due(&overdue, surcharge);

    Ok(Statement {
        active,
        overdue,
        overdue_total,
        aging_surcharge: surcharge,
        total_due: total,
        max_installments: max_installments(total),
    })
}
