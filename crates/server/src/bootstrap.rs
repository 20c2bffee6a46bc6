use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use cobranca_core::clock::SystemClock;
use cobranca_core::config::{AppConfig, ConfigError, LoadOptions};
use cobranca_core::session::SessionDispatcher;
use cobranca_db::repositories::SqlDebtorRepository;
use cobranca_db::{connect_with_settings, migrations, DbPool};
use cobranca_telegram::poller::{HttpPollTransport, PollingRunner, ReconnectPolicy};
use cobranca_telegram::updates::{MessageHandler, UpdateDispatcher};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let ledger = Arc::new(SqlDebtorRepository::new(db_pool.clone()));
    let sessions = SessionDispatcher::new(
        ledger,
        SystemClock,
        config.negotiation.as_negotiation_config(),
    );

    let mut dispatcher = UpdateDispatcher::new();
    dispatcher.register(MessageHandler::new(sessions));

    let runner = if config.telegram.bot_token.expose_secret().is_empty() {
        PollingRunner::with_noop_transport(dispatcher)
    } else {
        PollingRunner::new(
            Arc::new(HttpPollTransport::from_config(&config.telegram)),
            dispatcher,
            ReconnectPolicy::default(),
        )
    };

    Ok(Application { config, db_pool, runner })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use cobranca_core::clock::FixedClock;
    use cobranca_core::config::{ConfigOverrides, LoadOptions};
    use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};
    use cobranca_core::negotiation::states::{NegotiationConfig, NegotiationFlow, SessionReply};
    use cobranca_core::session::SessionDispatcher;
    use cobranca_db::repositories::{DebtorRepository, SqlDebtorRepository};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_a_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                telegram_bot_token: Some("invalid-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_without_a_token_uses_the_noop_transport() {
        let app = bootstrap(valid_overrides("sqlite:file:bootstrap_noop?mode=memory&cache=shared"))
            .await
            .expect("bootstrap succeeds");

        assert!(app.runner.is_noop_transport());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_ledger_and_negotiation() {
        let app =
            bootstrap(valid_overrides("sqlite:file:bootstrap_smoke?mode=memory&cache=shared"))
                .await
                .expect("bootstrap succeeds");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('debtor', 'bill')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("foundation tables available after bootstrap");
        assert_eq!(table_count, 2, "bootstrap should expose the ledger tables");

        let as_of = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("valid instant");
        let repo = Arc::new(SqlDebtorRepository::new(app.db_pool.clone()));
        repo.save(Debtor {
            national_id: NationalId::new("11122233344"),
            bills: vec![Bill {
                id: BillId("smoke-1".to_owned()),
                amount: Decimal::from(500),
                due_date: (as_of - Duration::days(40)).date_naive(),
                paid: false,
            }],
        })
        .await
        .expect("seed saves");

        let sessions = SessionDispatcher::new(
            repo,
            FixedClock(as_of),
            NegotiationConfig { aging_threshold_days: 30, flow: NegotiationFlow::MultiStep },
        );

        let reply = sessions
            .on_identifier_submitted("smoke-chat", "11122233344")
            .await
            .expect("lookup succeeds");
        let SessionReply::Statement { statement } = reply else {
            panic!("expected a statement");
        };
        assert_eq!(statement.max_installments, 5);

        sessions
            .on_installment_choice_submitted("smoke-chat", 5)
            .await
            .expect("count accepted");
        let reply = sessions
            .on_payment_method_submitted("smoke-chat", "pix")
            .await
            .expect("method accepted");
        let SessionReply::InstallmentPlan(plan) = reply else {
            panic!("expected a plan");
        };
        assert_eq!(plan.per_installment_rounded(), Decimal::new(116_20, 2));

        app.db_pool.close().await;
    }
}
