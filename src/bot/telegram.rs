use crate::transport::{ChatTransport, MessageHandle, OwnerId, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

/// Standard Bot API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboard<'a> {
    keyboard: Vec<Vec<KeyboardButton<'a>>>,
    resize_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

impl IncomingMessage {
    pub fn owner(&self) -> OwnerId {
        OwnerId(self.chat.id)
    }

    pub fn handle(&self) -> MessageHandle {
        MessageHandle(self.message_id)
    }
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout_ms: u64) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read_envelope<T: DeserializeOwned>(
        method: &'static str,
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        // Telegram returns the envelope with non-2xx statuses too
        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            return Err(TransportError::Api {
                method,
                description: envelope.description.unwrap_or_default(),
            });
        }
        envelope.result.ok_or(TransportError::Malformed(method))
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &B,
    ) -> Result<T, TransportError> {
        let response = self.client.post(self.url(method)).json(body).send().await?;
        Self::read_envelope(method, response).await
    }

    /// Long-poll for new messages starting at `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;
        if !updates.is_empty() {
            debug!("Received {} update(s)", updates.len());
        }
        Ok(updates)
    }

    /// Text message with a one-button reply keyboard
    pub async fn send_keyboard(
        &self,
        owner: OwnerId,
        text: &str,
        button: &str,
    ) -> Result<MessageHandle, TransportError> {
        let request = SendMessageRequest {
            chat_id: owner.0,
            text,
            reply_markup: Some(ReplyKeyboard {
                keyboard: vec![vec![KeyboardButton { text: button }]],
                resize_keyboard: true,
            }),
        };
        let sent: SentMessage = self.call("sendMessage", &request).await?;
        Ok(MessageHandle(sent.message_id))
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, owner: OwnerId, text: &str) -> Result<MessageHandle, TransportError> {
        let request = SendMessageRequest {
            chat_id: owner.0,
            text,
            reply_markup: None,
        };
        let sent: SentMessage = self.call("sendMessage", &request).await?;
        Ok(MessageHandle(sent.message_id))
    }

    async fn send_photo(
        &self,
        owner: OwnerId,
        image: Vec<u8>,
        caption: &str,
    ) -> Result<MessageHandle, TransportError> {
        let photo = Part::bytes(image)
            .file_name("card.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("chat_id", owner.0.to_string())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        let sent: SentMessage = Self::read_envelope("sendPhoto", response).await?;
        Ok(MessageHandle(sent.message_id))
    }

    async fn delete_message(&self, owner: OwnerId, message: MessageHandle) -> Result<(), TransportError> {
        let request = DeleteMessageRequest {
            chat_id: owner.0,
            message_id: message.0,
        };
        let _: bool = self.call("deleteMessage", &request).await?;
        Ok(())
    }
}
