use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use courierbot_core::config::TelegramConfig;
use courierbot_telegram::keyboards::markup_for;
use courierbot_telegram::runner::{TransportError, UpdateTransport};
use courierbot_telegram::update::{InboundMessage, Reply};

/// Long-polling transport over the Telegram Bot API. Keeps a confirmed
/// update offset so each update is delivered once, and drops the backlog
/// accumulated while the bot was down instead of replaying stale dialog
/// steps on startup.
pub struct HttpUpdateTransport {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: Option<i64>,
    buffer: VecDeque<InboundMessage>,
    initialized: bool,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    description: Option<String>,
    result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<courierbot_telegram::keyboards::ReplyKeyboardMarkup>,
}

impl HttpUpdateTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        // The long poll itself can legitimately sit idle for the full
        // timeout, so the client timeout leaves headroom on top of it.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.clone(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token.expose_secret(), method)
    }

    async fn call(&self, method: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        let response = self
            .http
            .get(self.method_url(method))
            .query(query)
            .send()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        if !envelope.ok {
            let detail = envelope.description.unwrap_or_else(|| "no description".to_owned());
            return Err(TransportError::Receive(format!("{method} rejected: {detail}")));
        }
        envelope
            .result
            .ok_or_else(|| TransportError::Receive(format!("{method} returned no result")))
    }

    /// Learns the latest pending update_id and skips past it, so updates
    /// queued while the bot was offline are never acted on.
    async fn initialize_offset(&self, state: &mut PollState) -> Result<(), TransportError> {
        let result = self
            .call("getUpdates", &[("offset", "-1".to_owned()), ("limit", "1".to_owned())])
            .await?;
        let updates: Vec<Update> = parse_updates(result)?;

        if let Some(latest) = updates.iter().map(|u| u.update_id).max() {
            debug!(skipped_through = latest, "dropping update backlog");
            state.offset = Some(latest + 1);
        }
        state.initialized = true;
        Ok(())
    }

    async fn fetch_batch(&self, state: &mut PollState) -> Result<(), TransportError> {
        let mut query = vec![("timeout", self.poll_timeout_secs.to_string())];
        if let Some(offset) = state.offset {
            query.push(("offset", offset.to_string()));
        }

        let result = self.call("getUpdates", &query).await?;
        let updates: Vec<Update> = parse_updates(result)?;

        for update in updates {
            let next_offset = update.update_id + 1;
            state.offset = Some(state.offset.map_or(next_offset, |o| o.max(next_offset)));
            if let Some(message) = inbound_from_update(update) {
                state.buffer.push_back(message);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateTransport for HttpUpdateTransport {
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            self.initialize_offset(&mut state).await?;
        }
        loop {
            if let Some(message) = state.buffer.pop_front() {
                return Ok(Some(message));
            }
            self.fetch_batch(&mut state).await?;
        }
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), TransportError> {
        let body = SendMessageBody {
            chat_id: reply.chat_id,
            text: &reply.text,
            reply_markup: reply.keyboard.map(markup_for),
        };

        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;

        if !envelope.ok {
            let detail = envelope.description.unwrap_or_else(|| "no description".to_owned());
            return Err(TransportError::Send(format!("sendMessage rejected: {detail}")));
        }
        Ok(())
    }
}

fn parse_updates(result: Value) -> Result<Vec<Update>, TransportError> {
    serde_json::from_value(result).map_err(|err| TransportError::Receive(err.to_string()))
}

/// Updates without a text message (edits, stickers, channel posts) carry
/// nothing the dialog can use; they only advance the offset.
fn inbound_from_update(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let text = message.text?;
    let from = message.from?;
    Some(InboundMessage { update_id: update.update_id, chat_id: message.chat.id, user_id: from.id, text })
}
