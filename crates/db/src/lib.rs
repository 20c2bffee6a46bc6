pub mod connection;
pub mod fixtures;
pub mod ingest;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedResult, VerificationResult};
pub use ingest::{parse_feed, CalendarEvent, IngestError, IngestSummary};
pub use repositories::{
    DebtorRepository, InMemoryDebtorRepository, RepositoryError, SqlDebtorRepository,
};
