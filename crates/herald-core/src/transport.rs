//! Outbound transport seam.
//!
//! One method, one recipient, one attempt. The dispatcher owns rate limiting
//! and failure accounting; implementations only deliver or fail.

use crate::error::Result;
use crate::types::BroadcastPayload;
use async_trait::async_trait;

/// Delivers one payload to one recipient through an external messaging API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    /// Attempt delivery exactly once. Any error means this recipient
    /// failed for this run — the caller decides what that costs.
    async fn send(&self, recipient: i64, payload: &BroadcastPayload) -> Result<()>;
}
