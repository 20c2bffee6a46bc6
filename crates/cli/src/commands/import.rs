use std::path::Path;

use cobranca_core::config::{AppConfig, LoadOptions};
use cobranca_db::repositories::SqlDebtorRepository;
use cobranca_db::{connect_with_settings, ingest, migrations};

use crate::commands::CommandResult;

pub fn run(file: &Path) -> CommandResult {
    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "import",
                "feed_read",
                format!("could not read feed file `{}`: {error}", file.display()),
                2,
            );
        }
    };

    let events = match ingest::parse_feed(&raw) {
        Ok(events) => events,
        Err(error) => {
            return CommandResult::failure("import", "feed_parse", error.to_string(), 2);
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "import",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "import",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlDebtorRepository::new(pool.clone());
        let summary = ingest::import_feed(&repository, &events)
            .await
            .map_err(|error| ("import", error.to_string(), 6u8))?;
        pool.close().await;

        Ok::<_, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => {
            let mut message = format!(
                "imported {} bills across {} debtors",
                summary.bills, summary.debtors
            );
            if !summary.skipped.is_empty() {
                message.push_str(&format!("; skipped {} records", summary.skipped.len()));
            }
            CommandResult::success("import", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("import", error_class, message, exit_code)
        }
    }
}
