//! Core entity model: user, channel, message and attachment, plus the inbound [`Handler`] trait.
//!
//! Transports implement these traits with wrapper objects around their native payloads. Wrappers are
//! shared as `Arc<dyn ...>`; two sightings of the same remote entity within one session yield the
//! same `Arc`, so identity can be compared with [`Arc::ptr_eq`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A remote account as seen by the bot.
#[async_trait]
pub trait User: Send + Sync + fmt::Debug {
    /// Transport-specific opaque identifier.
    fn identity_id(&self) -> &str;
    fn name(&self) -> String;
    fn has_dm_channel(&self) -> bool;
    fn has_avatar(&self) -> bool;
    async fn avatar_url(&self) -> Result<Option<String>>;
    /// Returns the direct-message channel with this user, creating it on the transport if needed.
    async fn dm_channel(&self) -> Result<Arc<dyn Channel>>;
    fn as_any(&self) -> &dyn Any;
}

/// The account the client itself is logged in as.
pub trait ClientUser: User {
    /// Whether the owning client session is still active.
    fn connected(&self) -> bool;
}

/// A place messages are exchanged in (guild channel, group, direct conversation...).
#[async_trait]
pub trait Channel: Send + Sync + fmt::Debug {
    fn identity_id(&self) -> &str;
    fn name(&self) -> String;
    async fn members(&self) -> Result<Vec<Arc<dyn User>>>;
    fn as_any(&self) -> &dyn Any;
}

/// Immutable snapshot of a message. Editing produces a new snapshot.
#[async_trait]
pub trait UserMessage: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn sender(&self) -> &Arc<dyn User>;
    fn channel(&self) -> &Arc<dyn Channel>;
    fn text(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn attachments(&self) -> &[MessageAttachment];
    fn editable(&self) -> bool;
    fn deletable(&self) -> bool;
    async fn edit_text(&self, text: &str) -> Result<Arc<dyn UserMessage>>;
    /// Best effort: returns false instead of failing.
    async fn delete(&self) -> bool;
}

/// Media class of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
}

/// Attachment on a message: URL for received content, raw bytes for content to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub kind: AttachmentKind,
    pub name: String,
    pub url: Option<String>,
    pub buffer: Option<Vec<u8>>,
}

impl MessageAttachment {
    pub fn from_url(kind: AttachmentKind, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            url: Some(url.into()),
            buffer: None,
        }
    }

    pub fn from_buffer(kind: AttachmentKind, name: impl Into<String>, buffer: Vec<u8>) -> Self {
        Self {
            kind,
            name: name.into(),
            url: None,
            buffer: Some(buffer),
        }
    }
}

/// Result of the inbound handler. `Reply(text)` asks the client to answer in the same channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    Continue,
    Reply(String),
}

/// Receives every inbound message, already wrapped.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, _message: &Arc<dyn UserMessage>) -> Result<HandlerResponse> {
        Ok(HandlerResponse::Continue)
    }
}
