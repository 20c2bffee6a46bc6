use std::collections::HashMap;

use tokio::sync::RwLock;

use cobranca_core::domain::bill::{Debtor, NationalId};
use cobranca_core::session::{LedgerError, LedgerStore};

use super::{DebtorRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryDebtorRepository {
    debtors: RwLock<HashMap<String, Debtor>>,
}

#[async_trait::async_trait]
impl DebtorRepository for InMemoryDebtorRepository {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, RepositoryError> {
        let debtors = self.debtors.read().await;
        Ok(debtors.get(national_id.as_str()).cloned())
    }

    async fn save(&self, debtor: Debtor) -> Result<(), RepositoryError> {
        let mut debtors = self.debtors.write().await;
        debtors.insert(debtor.national_id.as_str().to_owned(), debtor);
        Ok(())
    }

    async fn list_national_ids(&self) -> Result<Vec<NationalId>, RepositoryError> {
        let debtors = self.debtors.read().await;
        let mut ids: Vec<NationalId> =
            debtors.values().map(|debtor| debtor.national_id.clone()).collect();
        ids.sort_by(|left, right| left.as_str().cmp(right.as_str()));
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryDebtorRepository {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, LedgerError> {
        DebtorRepository::find_by_national_id(self, national_id)
            .await
            .map_err(|error| LedgerError(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};

    use crate::repositories::{DebtorRepository, InMemoryDebtorRepository};

    fn debtor() -> Debtor {
        Debtor {
            national_id: NationalId::new("12345678900"),
            bills: vec![Bill {
                id: BillId("b-1".to_owned()),
                amount: Decimal::new(150_00, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"),
                paid: false,
            }],
        }
    }

    #[tokio::test]
    async fn in_memory_debtor_repo_round_trip() {
        let repo = InMemoryDebtorRepository::default();
        repo.save(debtor()).await.expect("save succeeds");

        let loaded = repo
            .find_by_national_id(&NationalId::new("12345678900"))
            .await
            .expect("lookup succeeds")
            .expect("debtor exists");
        assert_eq!(loaded, debtor());

        let missing = repo
            .find_by_national_id(&NationalId::new("00000000000"))
            .await
            .expect("lookup succeeds");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn save_replaces_the_bill_set() {
        let repo = InMemoryDebtorRepository::default();
        repo.save(debtor()).await.expect("save succeeds");

        let mut updated = debtor();
        updated.bills.clear();
        repo.save(updated).await.expect("resave succeeds");

        let loaded = repo
            .find_by_national_id(&NationalId::new("12345678900"))
            .await
            .expect("lookup succeeds")
            .expect("debtor exists");
        assert!(loaded.bills.is_empty());
    }
}
