//! Telegram Bot API client — long polling + message/media sending.

use herald_core::error::{HeraldError, Result};
use herald_core::types::MediaRef;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thin client over the Bot API.
#[derive(Clone)]
pub struct TelegramApi {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| HeraldError::Api(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| HeraldError::Api(format!("Invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| HeraldError::Api("No bot info".into()))
    }

    /// Get updates using long polling. `offset` is the last seen
    /// update_id + 1.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "30".into()),
                (
                    "allowed_updates",
                    "[\"message\",\"callback_query\"]".into(),
                ),
            ])
            .send()
            .await
            .map_err(|e| HeraldError::Api(format!("getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| HeraldError::Api(format!("Invalid getUpdates response: {e}")))?;

        if !body.ok {
            return Err(HeraldError::Api(format!(
                "getUpdates error: {}",
                body.description.unwrap_or_default()
            )));
        }
        Ok(body.result.unwrap_or_default())
    }

    /// Send a plain text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        self.call("sendMessage", &body).await
    }

    /// Send a text message with an inline keyboard.
    pub async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": keyboard,
        });
        self.call("sendMessage", &body).await
    }

    /// Send a photo, uploading local files as multipart.
    pub async fn send_photo(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<()> {
        self.send_media("sendPhoto", "photo", chat_id, media, caption)
            .await
    }

    /// Send a video, uploading local files as multipart.
    pub async fn send_video(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<()> {
        self.send_media("sendVideo", "video", chat_id, media, caption)
            .await
    }

    async fn send_media(
        &self,
        method: &str,
        field: &'static str,
        chat_id: i64,
        media: &MediaRef,
        caption: &str,
    ) -> Result<()> {
        match media {
            MediaRef::FileId(file_id) => {
                let body = serde_json::json!({
                    "chat_id": chat_id,
                    field: file_id,
                    "caption": caption,
                });
                self.call(method, &body).await
            }
            MediaRef::LocalFile(path) => self.upload(method, field, chat_id, path, caption).await,
        }
    }

    async fn upload(
        &self,
        method: &str,
        field: &'static str,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HeraldError::Transport(format!("Read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("upload")
            .to_string();
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                field,
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| HeraldError::Api(format!("{method} upload failed: {e}")))?;
        Self::check(method, response).await
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call("answerCallbackQuery", &body).await
    }

    async fn call(&self, method: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| HeraldError::Api(format!("{method} failed: {e}")))?;
        Self::check(method, response).await
    }

    async fn check(method: &str, response: reqwest::Response) -> Result<()> {
        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| HeraldError::Api(format!("Invalid {method} response: {e}")))?;
        if !result.ok {
            return Err(HeraldError::Api(format!(
                "{method} error: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<TelegramPhotoSize>>,
    pub video: Option<TelegramVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramVideo {
    pub file_id: String,
}

/// Inline keyboard attached to a message.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// One row of buttons from (label, callback_data) pairs.
    pub fn row(buttons: &[(&str, &str)]) -> Self {
        Self {
            inline_keyboard: vec![
                buttons
                    .iter()
                    .map(|(text, data)| InlineKeyboardButton {
                        text: (*text).to_string(),
                        callback_data: (*data).to_string(),
                    })
                    .collect(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_serialization() {
        let kb = InlineKeyboardMarkup::row(&[("Yes", "confirm"), ("No", "cancel")]);
        let json = serde_json::to_value(&kb).unwrap();
        assert_eq!(json["inline_keyboard"][0][0]["text"], "Yes");
        assert_eq!(json["inline_keyboard"][0][1]["callback_data"], "cancel");
    }

    #[test]
    fn test_update_deserialization() {
        let raw = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": {"id": 5, "is_bot": false, "first_name": "Ann"},
                "chat": {"id": 5, "type": "private"},
                "text": "/subscribe"
            }
        });
        let update: TelegramUpdate = serde_json::from_value(raw).unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.text.as_deref(), Some("/subscribe"));
        assert_eq!(msg.chat.id, 5);
        assert!(msg.photo.is_none());
    }

    #[test]
    fn test_callback_deserialization() {
        let raw = serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 5, "is_bot": false, "first_name": "Ann"},
                "data": "send_now"
            }
        });
        let update: TelegramUpdate = serde_json::from_value(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("send_now"));
        assert_eq!(cb.from.id, 5);
    }
}
