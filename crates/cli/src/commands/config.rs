use secrecy::ExposeSecret;
use serde::Serialize;

use cobranca_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Serialize)]
struct ConfigView {
    database: DatabaseView,
    telegram: TelegramView,
    negotiation: NegotiationView,
    server: ServerView,
    logging: LoggingView,
}

#[derive(Debug, Serialize)]
struct DatabaseView {
    url: String,
    max_connections: u32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct TelegramView {
    bot_token: &'static str,
    api_base_url: String,
    poll_timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct NegotiationView {
    aging_threshold_days: i64,
    flow: String,
}

#[derive(Debug, Serialize)]
struct ServerView {
    bind_address: String,
    health_check_port: u16,
    graceful_shutdown_secs: u64,
}

#[derive(Debug, Serialize)]
struct LoggingView {
    level: String,
    format: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return format!("{{\"command\":\"config\",\"status\":\"error\",\"message\":{}}}",
                serde_json::Value::String(error.to_string()));
        }
    };

    let view = ConfigView {
        database: DatabaseView {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            timeout_secs: config.database.timeout_secs,
        },
        telegram: TelegramView {
            bot_token: if config.telegram.bot_token.expose_secret().is_empty() {
                "<unset>"
            } else {
                "<redacted>"
            },
            api_base_url: config.telegram.api_base_url.clone(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
        },
        negotiation: NegotiationView {
            aging_threshold_days: config.negotiation.aging_threshold_days,
            flow: format!("{:?}", config.negotiation.flow),
        },
        server: ServerView {
            bind_address: config.server.bind_address.clone(),
            health_check_port: config.server.health_check_port,
            graceful_shutdown_secs: config.server.graceful_shutdown_secs,
        },
        logging: LoggingView {
            level: config.logging.level.clone(),
            format: format!("{:?}", config.logging.format),
        },
    };

    serde_json::to_string_pretty(&view)
        .unwrap_or_else(|error| format!("config serialization failed: {error}"))
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn config_output_never_contains_a_raw_token() {
        let output = run();
        assert!(output.contains("\"bot_token\""));
        assert!(output.contains("<unset>") || output.contains("<redacted>"));
    }
}
