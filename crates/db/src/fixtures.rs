use chrono::NaiveDate;
use rust_decimal::Decimal;

use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};

use crate::repositories::{DebtorRepository, RepositoryError};

const SEED_NATIONAL_IDS: &[&str] = &["11122233344", "55566677788", "99988877766"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub debtors: usize,
    pub bills: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Deterministic demo ledger: one debtor with aged overdue debt, one with a
/// mix of paid and upcoming bills, one with a single small overdue bill.
pub struct SeedDataset;

impl SeedDataset {
    pub fn debtors() -> Vec<Debtor> {
        vec![
            Debtor {
                national_id: NationalId::new("11122233344"),
                bills: vec![
                    bill("seed-1-1", "500.00", 2025, 3, 1, false),
                    bill("seed-1-2", "120.00", 2025, 4, 15, false),
                ],
            },
            Debtor {
                national_id: NationalId::new("55566677788"),
                bills: vec![
                    bill("seed-2-1", "89.90", 2025, 2, 10, true),
                    bill("seed-2-2", "89.90", 2026, 1, 10, false),
                ],
            },
            Debtor {
                national_id: NationalId::new("99988877766"),
                bills: vec![bill("seed-3-1", "75.50", 2025, 5, 5, false)],
            },
        ]
    }

    pub async fn load<R>(repository: &R) -> Result<SeedResult, RepositoryError>
    where
        R: DebtorRepository,
    {
        let debtors = Self::debtors();
        let mut result = SeedResult { debtors: 0, bills: 0 };

        for debtor in debtors {
            result.debtors += 1;
            result.bills += debtor.bills.len();
            repository.save(debtor).await?;
        }

        Ok(result)
    }

    pub async fn verify<R>(repository: &R) -> Result<VerificationResult, RepositoryError>
    where
        R: DebtorRepository,
    {
        let mut missing = Vec::new();
        for national_id in SEED_NATIONAL_IDS {
            let found = repository
                .find_by_national_id(&NationalId::new(*national_id))
                .await?
                .is_some();
            if !found {
                missing.push((*national_id).to_owned());
            }
        }

        Ok(VerificationResult { complete: missing.is_empty(), missing })
    }
}

fn bill(id: &str, amount: &str, year: i32, month: u32, day: u32, paid: bool) -> Bill {
    Bill {
        id: BillId(id.to_owned()),
        amount: amount.parse::<Decimal>().unwrap_or_default(),
        due_date: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
        paid,
    }
}
