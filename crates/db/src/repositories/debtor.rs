use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};
use cobranca_core::session::{LedgerError, LedgerStore};

use super::{DebtorRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDebtorRepository {
    pool: DbPool,
}

impl SqlDebtorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BillRow {
    id: String,
    amount: String,
    due_date: String,
    paid: i64,
}

impl BillRow {
    fn into_bill(self) -> Result<Bill, RepositoryError> {
        let amount = Decimal::from_str(&self.amount).map_err(|error| {
            RepositoryError::Decode(format!("bill {} has a malformed amount: {error}", self.id))
        })?;
        let due_date = NaiveDate::parse_from_str(&self.due_date, "%Y-%m-%d").map_err(|error| {
            RepositoryError::Decode(format!("bill {} has a malformed due date: {error}", self.id))
        })?;

        Ok(Bill { id: BillId(self.id), amount, due_date, paid: self.paid != 0 })
    }
}

#[async_trait::async_trait]
impl DebtorRepository for SqlDebtorRepository {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, RepositoryError> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT national_id FROM debtor WHERE national_id = ?")
                .bind(national_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<BillRow> = sqlx::query_as(
            "SELECT id, amount, due_date, paid FROM bill \
             WHERE debtor_national_id = ? ORDER BY due_date, id",
        )
        .bind(national_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let bills =
            rows.into_iter().map(BillRow::into_bill).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Debtor { national_id: national_id.clone(), bills }))
    }

    async fn save(&self, debtor: Debtor) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO debtor (national_id) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(debtor.national_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM bill WHERE debtor_national_id = ?")
            .bind(debtor.national_id.as_str())
            .execute(&mut *tx)
            .await?;

        for bill in &debtor.bills {
            sqlx::query(
                "INSERT INTO bill (id, debtor_national_id, amount, due_date, paid) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&bill.id.0)
            .bind(debtor.national_id.as_str())
            .bind(bill.amount.to_string())
            .bind(bill.due_date.format("%Y-%m-%d").to_string())
            .bind(i64::from(bill.paid))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_national_ids(&self) -> Result<Vec<NationalId>, RepositoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT national_id FROM debtor ORDER BY national_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(national_id,)| NationalId(national_id)).collect())
    }
}

#[async_trait::async_trait]
impl LedgerStore for SqlDebtorRepository {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, LedgerError> {
        DebtorRepository::find_by_national_id(self, national_id)
            .await
            .map_err(|error| LedgerError(error.to_string()))
    }
}
