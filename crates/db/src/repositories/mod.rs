use async_trait::async_trait;
use thiserror::Error;

use cobranca_core::domain::bill::{Debtor, NationalId};

pub mod debtor;
pub mod memory;

pub use debtor::SqlDebtorRepository;
pub use memory::InMemoryDebtorRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Ledger persistence port. `save` replaces the debtor's bill set wholesale,
/// matching the daily full-feed rewrite that populates the ledger.
#[async_trait]
pub trait DebtorRepository: Send + Sync {
    async fn find_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Debtor>, RepositoryError>;

    async fn save(&self, debtor: Debtor) -> Result<(), RepositoryError>;

    async fn list_national_ids(&self) -> Result<Vec<NationalId>, RepositoryError>;
}
