use std::future::Future;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::{
    config::TelegramConfig,
    desk::{ChatEvent, Reply, ReplyFormat},
};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

/// A decoded update ready for the desk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub callback_id: Option<String>,
    pub event: ChatEvent,
}

/// Returns `None` for update kinds the desk does not handle.
pub fn decode_update(update: TelegramUpdate) -> Option<InboundUpdate> {
    if let Some(callback) = update.callback_query {
        return Some(InboundUpdate {
            update_id: update.update_id,
            chat_id: callback.message.as_ref().map(|m| m.chat.id),
            callback_id: Some(callback.id),
            event: ChatEvent::Button {
                action_id: callback.data.unwrap_or_default(),
            },
        });
    }

    let message = update.message?;
    let text = message.text?;
    Some(InboundUpdate {
        update_id: update.update_id,
        chat_id: Some(message.chat.id),
        callback_id: None,
        event: classify_text(&text),
    })
}

fn classify_text(text: &str) -> ChatEvent {
    let trimmed = text.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatEvent::Text {
            text: text.to_string(),
        };
    };

    let word = command.split_whitespace().next().unwrap_or_default();
    let name = word.split('@').next().unwrap_or_default();
    if name == "start" {
        ChatEvent::Start
    } else {
        ChatEvent::Command {
            name: name.to_string(),
        }
    }
}

pub trait ChatTransport: Send + Sync {
    fn send_reply(&self, chat_id: i64, reply: &Reply) -> impl Future<Output = Result<()>> + Send;
    fn answer_button(&self, callback_id: &str) -> impl Future<Output = Result<()>> + Send;
}

pub fn send_message_payload(chat_id: i64, reply: &Reply) -> Value {
    let mut payload = json!({
        "chat_id": chat_id,
        "text": reply.text,
    });

    if reply.format == ReplyFormat::Markdown {
        payload["parse_mode"] = json!("Markdown");
    }

    if let Some(keyboard) = &reply.keyboard {
        let rows: Vec<Value> = keyboard
            .iter()
            .map(|button| json!([{ "text": button.label, "callback_data": button.action_id }]))
            .collect();
        payload["reply_markup"] = json!({ "inline_keyboard": rows });
    }

    payload
}

/// Bot API client. The token lives in the request URL, so URLs never appear
/// in errors or logs.
#[derive(Clone)]
pub struct TelegramClient {
    api_base: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        }
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let parsed = execute_curl_json(method, &url, body.to_string()).await?;

        if parsed.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = parsed
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            anyhow::bail!("Telegram {method} rejected: {description}");
        }

        Ok(parsed)
    }
}

impl ChatTransport for TelegramClient {
    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        self.call("sendMessage", send_message_payload(chat_id, reply))
            .await
            .map(|_| ())
    }

    async fn answer_button(&self, callback_id: &str) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await
        .map(|_| ())
    }
}

async fn execute_curl_json(method: &str, url: &str, body: String) -> Result<Value> {
    let output = Command::new("curl")
        .arg("-sS")
        .arg("-X")
        .arg("POST")
        .arg(url)
        .arg("-H")
        .arg("Content-Type: application/json")
        .arg("-d")
        .arg(body)
        .output()
        .await
        .with_context(|| format!("Failed to execute curl for Telegram {method}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Telegram {method} curl request failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8(output.stdout)
        .with_context(|| format!("Telegram {method} response was not valid UTF-8"))?;
    serde_json::from_str::<Value>(&stdout).with_context(|| {
        format!(
            "Failed to parse Telegram {method} response: {}",
            stdout.trim()
        )
    })
}
