//! Long-polling front-end — subscriber commands plus the admin compose
//! dialogue. Collects a fully-formed (payload, time, creator) tuple and
//! hands it to the controller; everything after that is the scheduler
//! core's job.

use chrono::{Local, Utc};
use herald_core::HeraldConfig;
use herald_core::error::Result;
use herald_core::types::{BroadcastPayload, Subscriber};
use herald_scheduler::BroadcastController;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::{InlineKeyboardMarkup, TelegramApi, TelegramCallbackQuery, TelegramMessage};
use crate::dialogue::{ComposeState, SendMode, extract_payload, parse_schedule_time};

pub struct Bot {
    api: TelegramApi,
    controller: Arc<BroadcastController>,
    config: HeraldConfig,
    /// Per-chat compose dialogue state.
    dialogues: Mutex<HashMap<i64, ComposeState>>,
}

impl Bot {
    pub fn new(api: TelegramApi, controller: Arc<BroadcastController>, config: HeraldConfig) -> Self {
        Self {
            api,
            controller,
            config,
            dialogues: Mutex::new(HashMap::new()),
        }
    }

    /// Poll updates forever. Transient API errors back off and retry.
    pub async fn run(&self) -> Result<()> {
        let me = self.api.get_me().await?;
        tracing::info!(
            "Bot online: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        );

        let mut offset = 0i64;
        loop {
            match self.api.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(msg) = update.message {
                            if let Err(e) = self.handle_message(msg).await {
                                tracing::error!("Message handler error: {e}");
                            }
                        }
                        if let Some(cb) = update.callback_query {
                            if let Err(e) = self.handle_callback(cb).await {
                                tracing::error!("Callback handler error: {e}");
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Polling error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(
                self.config.poll_interval_secs,
            ))
            .await;
        }
    }

    async fn handle_message(&self, msg: TelegramMessage) -> Result<()> {
        let Some(from) = msg.from.clone() else {
            return Ok(());
        };
        if from.is_bot {
            return Ok(());
        }
        let chat_id = msg.chat.id;

        if let Some(text) = msg.text.as_deref()
            && let Some(command) = text.split_whitespace().next()
            && command.starts_with('/')
        {
            return match command {
                "/start" => self.cmd_start(chat_id, &from.first_name, from.id).await,
                "/subscribe" => self.cmd_subscribe(chat_id, &from).await,
                "/unsubscribe" => self.cmd_unsubscribe(chat_id, from.id).await,
                "/status" => self.cmd_status(chat_id, from.id).await,
                "/send_message" => self.cmd_send_message(chat_id, from.id).await,
                "/stats" => self.cmd_stats(chat_id, from.id).await,
                _ => Ok(()),
            };
        }

        self.handle_dialogue_input(chat_id, msg).await
    }

    // --- Subscriber commands ---

    async fn cmd_start(&self, chat_id: i64, first_name: &str, user_id: i64) -> Result<()> {
        let mut text = format!(
            "Hi {first_name}! 👋\n\n\
             I deliver announcements to subscribers.\n\n\
             Commands:\n\
             /subscribe — join the mailing list\n\
             /unsubscribe — leave the mailing list\n\
             /status — check your subscription"
        );
        if self.config.is_admin(user_id) {
            text.push_str(
                "\n\nYou are an operator. Extra commands:\n\
                 /send_message — broadcast to all subscribers\n\
                 /stats — subscriber and schedule stats",
            );
        }
        self.api.send_message(chat_id, &text).await
    }

    async fn cmd_subscribe(&self, chat_id: i64, from: &crate::api::TelegramUser) -> Result<()> {
        let directory = self.controller.directory();
        if directory.contains(from.id)? {
            return self
                .api
                .send_message(chat_id, "You're already subscribed! 😊")
                .await;
        }
        directory.add(&Subscriber::with_names(
            from.id,
            from.username.clone(),
            Some(from.first_name.clone()),
            from.last_name.clone(),
        ))?;
        self.api
            .send_message(
                chat_id,
                "Subscribed! 🎉 You'll now receive announcements here.",
            )
            .await
    }

    async fn cmd_unsubscribe(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let directory = self.controller.directory();
        if !directory.contains(user_id)? {
            return self
                .api
                .send_message(chat_id, "You weren't subscribed. 🤔")
                .await;
        }
        directory.remove(user_id)?;
        self.api
            .send_message(chat_id, "Unsubscribed. 👋 Hope to see you again!")
            .await
    }

    async fn cmd_status(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let text = if self.controller.directory().contains(user_id)? {
            "You're subscribed! 👍"
        } else {
            "You're not subscribed. Use /subscribe to join."
        };
        self.api.send_message(chat_id, text).await
    }

    // --- Operator commands ---

    async fn require_admin(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        if self.config.is_admin(user_id) {
            return Ok(true);
        }
        self.api
            .send_message(chat_id, "This command is for operators only.")
            .await?;
        Ok(false)
    }

    async fn cmd_send_message(&self, chat_id: i64, user_id: i64) -> Result<()> {
        if !self.require_admin(chat_id, user_id).await? {
            return Ok(());
        }
        self.dialogues
            .lock()
            .await
            .insert(chat_id, ComposeState::AwaitingMode);
        let keyboard =
            InlineKeyboardMarkup::row(&[("Send now", "send_now"), ("Schedule", "schedule")]);
        self.api
            .send_message_with_keyboard(chat_id, "Choose a send mode:", &keyboard)
            .await
    }

    async fn cmd_stats(&self, chat_id: i64, user_id: i64) -> Result<()> {
        if !self.require_admin(chat_id, user_id).await? {
            return Ok(());
        }
        let count = self.controller.directory().count()?;
        let pending = self.controller.jobs().list_pending()?;

        let mut text = format!(
            "📊 Stats\n\nSubscribers: {count}\nScheduled broadcasts: {}\n",
            pending.len()
        );
        if !pending.is_empty() {
            text.push_str("\n📅 Next up:\n");
            for (i, job) in pending.iter().take(5).enumerate() {
                text.push_str(&format!(
                    "{}. #{} — {}, at {}\n",
                    i + 1,
                    job.id,
                    job.payload.kind(),
                    job.scheduled_at
                        .with_timezone(&Local)
                        .format("%d.%m.%Y %H:%M"),
                ));
            }
        }
        self.api.send_message(chat_id, &text).await
    }

    // --- Compose dialogue ---

    async fn handle_dialogue_input(&self, chat_id: i64, msg: TelegramMessage) -> Result<()> {
        let state = self.dialogues.lock().await.remove(&chat_id);
        match state {
            Some(ComposeState::AwaitingContent { mode }) => {
                let Some(payload) = extract_payload(&msg) else {
                    self.dialogues
                        .lock()
                        .await
                        .insert(chat_id, ComposeState::AwaitingContent { mode });
                    return self
                        .api
                        .send_message(chat_id, "Please send text, a photo, or a video.")
                        .await;
                };
                match mode {
                    SendMode::Now => self.ask_confirmation(chat_id, payload, None).await,
                    SendMode::Schedule => {
                        self.dialogues
                            .lock()
                            .await
                            .insert(chat_id, ComposeState::AwaitingScheduleTime { payload });
                        self.api
                            .send_message(
                                chat_id,
                                "Got it. Now send the delivery date and time as:\n\
                                 DD.MM.YYYY HH:MM\n\nFor example: 31.12.2026 15:30",
                            )
                            .await
                    }
                }
            }
            Some(ComposeState::AwaitingScheduleTime { payload }) => {
                let Some(text) = msg.text.as_deref() else {
                    self.dialogues
                        .lock()
                        .await
                        .insert(chat_id, ComposeState::AwaitingScheduleTime { payload });
                    return self
                        .api
                        .send_message(chat_id, "Send the time as text: DD.MM.YYYY HH:MM")
                        .await;
                };
                match parse_schedule_time(text, Utc::now()) {
                    Ok(at) => self.ask_confirmation(chat_id, payload, Some(at)).await,
                    Err(e) => {
                        self.dialogues
                            .lock()
                            .await
                            .insert(chat_id, ComposeState::AwaitingScheduleTime { payload });
                        self.api
                            .send_message(chat_id, &format!("Can't schedule that: {e}."))
                            .await
                    }
                }
            }
            Some(other) => {
                // Not expecting free-form input in this state; keep it.
                self.dialogues.lock().await.insert(chat_id, other);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn ask_confirmation(
        &self,
        chat_id: i64,
        payload: BroadcastPayload,
        schedule_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<()> {
        let count = self.controller.directory().count()?;
        let (text, confirm_data) = match schedule_at {
            None => (
                format!(
                    "📬 Broadcast confirmation\n\n{}\n\nThe message will go to {count} subscribers.",
                    payload.summary()
                ),
                "confirm_send",
            ),
            Some(at) => (
                format!(
                    "📅 Schedule confirmation\n\n{}\nDelivery at: {}\nRecipients: {count} subscribers",
                    payload.summary(),
                    at.with_timezone(&Local).format("%d.%m.%Y %H:%M"),
                ),
                "confirm_schedule",
            ),
        };
        self.dialogues.lock().await.insert(
            chat_id,
            ComposeState::Confirming {
                payload,
                schedule_at,
            },
        );
        let keyboard =
            InlineKeyboardMarkup::row(&[("✅ Confirm", confirm_data), ("❌ Cancel", "cancel_send")]);
        self.api
            .send_message_with_keyboard(chat_id, &text, &keyboard)
            .await
    }

    async fn handle_callback(&self, cb: TelegramCallbackQuery) -> Result<()> {
        if let Err(e) = self.api.answer_callback_query(&cb.id).await {
            tracing::warn!("answerCallbackQuery failed: {e}");
        }
        let chat_id = cb.message.as_ref().map_or(cb.from.id, |m| m.chat.id);
        let user_id = cb.from.id;
        if !self.config.is_admin(user_id) {
            return Ok(());
        }

        match cb.data.as_deref() {
            Some("send_now") | Some("schedule") => {
                let mode = if cb.data.as_deref() == Some("send_now") {
                    SendMode::Now
                } else {
                    SendMode::Schedule
                };
                self.dialogues
                    .lock()
                    .await
                    .insert(chat_id, ComposeState::AwaitingContent { mode });
                self.api
                    .send_message(
                        chat_id,
                        "Send the message to broadcast.\n\nText, a photo, or a video.",
                    )
                    .await
            }
            Some("cancel_send") => {
                self.dialogues.lock().await.remove(&chat_id);
                self.api.send_message(chat_id, "Broadcast cancelled.").await
            }
            Some("confirm_send") => {
                let state = self.dialogues.lock().await.remove(&chat_id);
                let Some(ComposeState::Confirming { payload, .. }) = state else {
                    return Ok(());
                };
                self.api.send_message(chat_id, "Starting broadcast…").await?;
                let (id, outcome) = self.controller.send_now(payload, user_id).await?;
                self.api
                    .send_message(
                        chat_id,
                        &format!(
                            "✅ Broadcast #{id} complete!\n\nSent: {}\nFailed: {}",
                            outcome.sent, outcome.failed
                        ),
                    )
                    .await
            }
            Some("confirm_schedule") => {
                let state = self.dialogues.lock().await.remove(&chat_id);
                let Some(ComposeState::Confirming {
                    payload,
                    schedule_at: Some(at),
                }) = state
                else {
                    return Ok(());
                };
                let count = self.controller.directory().count()?;
                let id = self.controller.create_and_schedule(payload, at, user_id).await?;
                self.api
                    .send_message(
                        chat_id,
                        &format!(
                            "✅ Broadcast scheduled!\n\nJob id: {id}\nDelivery at: {}\nRecipients: {count} subscribers",
                            at.with_timezone(&Local).format("%d.%m.%Y %H:%M"),
                        ),
                    )
                    .await
            }
            _ => Ok(()),
        }
    }
}
