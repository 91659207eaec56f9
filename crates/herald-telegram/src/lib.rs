//! # Herald Telegram
//!
//! Telegram Bot API integration: the raw API client, the outbound
//! [`Transport`](herald_core::Transport) used by the dispatcher, and the
//! long-polling front-end with the operator compose dialogue.

pub mod api;
pub mod bot;
pub mod dialogue;
pub mod transport;

pub use api::TelegramApi;
pub use bot::Bot;
pub use transport::TelegramTransport;
