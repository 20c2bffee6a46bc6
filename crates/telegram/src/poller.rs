use std::collections::VecDeque;
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cobranca_core::config::TelegramConfig;

use crate::updates::{
    default_dispatcher, ChatEvent, DispatchError, EventContext, HandlerResult, MessageEvent,
    OutboundMessage, UpdateDispatcher, UpdateEnvelope,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Long-poll transport. `next_envelope` blocks until an update arrives or
/// the stream ends; `Ok(None)` means the transport is closed for good.
#[async_trait]
pub trait PollTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError>;
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopPollTransport;

#[async_trait]
impl PollTransport for NoopPollTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: i64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn PollTransport>,
    dispatcher: UpdateDispatcher,
    reconnect_policy: ReconnectPolicy,
    noop_transport: bool,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopPollTransport),
            dispatcher: default_dispatcher(),
            reconnect_policy: ReconnectPolicy::default(),
            noop_transport: true,
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn PollTransport>,
        dispatcher: UpdateDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, noop_transport: false }
    }

    /// Runner wired to real handlers but no outbound transport; used when no
    /// bot token is configured.
    pub fn with_noop_transport(dispatcher: UpdateDispatcher) -> Self {
        Self {
            transport: Arc::new(NoopPollTransport),
            dispatcher,
            reconnect_policy: ReconnectPolicy::default(),
            noop_transport: true,
        }
    }

    pub fn is_noop_transport(&self) -> bool {
        self.noop_transport
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "poll transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "poll retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening poll transport connection");
        self.transport.connect().await?;
        info!(attempt, "poll transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "poll transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let session_key = session_key_of(&envelope);

            info!(
                event_name = "ingress.telegram.update_received",
                update_id = envelope.update_id,
                event_type = ?envelope.event.event_type(),
                session_key = session_key.as_deref().unwrap_or("unknown"),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(envelope.update_id).await {
                warn!(
                    update_id = envelope.update_id,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(update_id = envelope.update_id, "acknowledged chat update");
            }

            let context = EventContext { correlation_id: format!("update-{}", envelope.update_id) };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(message)) => {
                    if let Err(error) = self.transport.send(&message).await {
                        warn!(
                            update_id = envelope.update_id,
                            chat_id = message.chat_id,
                            error = %error,
                            "failed to deliver response; continuing poll loop"
                        );
                    }
                }
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
                Err(error) => {
                    warn!(
                        update_id = envelope.update_id,
                        error = %error,
                        "update dispatch failed; continuing poll loop"
                    );
                }
            }
        }
    }
}

fn session_key_of(envelope: &UpdateEnvelope) -> Option<String> {
    match &envelope.event {
        ChatEvent::Message(event) => Some(event.session_key()),
        ChatEvent::Unsupported { .. } => None,
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

fn envelope_from_update(update: TgUpdate) -> UpdateEnvelope {
    let event = match update.message {
        Some(TgMessage { chat, from, text: Some(text) }) => ChatEvent::Message(MessageEvent {
            chat_id: chat.id,
            user_id: from.map(|user| user.id).unwrap_or(chat.id),
            text,
        }),
        Some(_) => ChatEvent::Unsupported { event_type: "message_without_text".to_owned() },
        None => ChatEvent::Unsupported { event_type: "non_message_update".to_owned() },
    };

    UpdateEnvelope { update_id: update.update_id, event }
}

struct PollState {
    offset: i64,
    queue: VecDeque<UpdateEnvelope>,
}

/// Bot-API long-poll transport (`getUpdates` / `sendMessage`).
pub struct HttpPollTransport {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl HttpPollTransport {
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState { offset: 0, queue: VecDeque::new() }),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.bot_token.expose_secret())
    }

    async fn fetch_updates(&self, offset: i64) -> Result<Vec<TgUpdate>, TransportError> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("timeout", self.poll_timeout_secs.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(|error| TransportError::Receive(error.to_string()))?;

        let payload: ApiEnvelope<Vec<TgUpdate>> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(error.to_string()))?;

        if !payload.ok {
            return Err(TransportError::Receive(
                payload.description.unwrap_or_else(|| "getUpdates rejected".to_owned()),
            ));
        }

        Ok(payload.result.unwrap_or_default())
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let payload: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        if !payload.ok {
            return Err(TransportError::Connect(
                payload.description.unwrap_or_else(|| "getMe rejected".to_owned()),
            ));
        }

        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        loop {
            let mut state = self.state.lock().await;
            if let Some(envelope) = state.queue.pop_front() {
                return Ok(Some(envelope));
            }
            let offset = state.offset;
            drop(state);

            // An empty batch is a timed-out long poll; ask again.
            let updates = self.fetch_updates(offset).await?;
            let mut state = self.state.lock().await;
            for update in updates {
                state.queue.push_back(envelope_from_update(update));
            }
        }
    }

    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.offset = state.offset.max(update_id + 1);
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": message.chat_id, "text": message.text }))
            .send()
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;

        let payload: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;
        if !payload.ok {
            return Err(TransportError::Send(
                payload.description.unwrap_or_else(|| "sendMessage rejected".to_owned()),
            ));
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
