//! Outbound transport over the Bot API — one payload, one recipient,
//! one attempt.

use async_trait::async_trait;
use herald_core::error::Result;
use herald_core::transport::Transport;
use herald_core::types::BroadcastPayload;

use crate::api::TelegramApi;

pub struct TelegramTransport {
    api: TelegramApi,
}

impl TelegramTransport {
    pub fn new(api: TelegramApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, recipient: i64, payload: &BroadcastPayload) -> Result<()> {
        match payload {
            BroadcastPayload::Text { body } => self.api.send_message(recipient, body).await,
            BroadcastPayload::Photo { media, caption } => {
                self.api.send_photo(recipient, media, caption).await
            }
            BroadcastPayload::Video { media, caption } => {
                self.api.send_video(recipient, media, caption).await
            }
        }
    }
}
