//! Native Discord payloads as delivered by the REST API and the gateway, before wrapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CDN_BASE: &str = "https://cdn.discordapp.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar hash; `None` when the account uses a default avatar.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl NativeUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            global_name: None,
            avatar: None,
            bot: false,
        }
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeChannel {
    pub id: String,
    /// Discord channel type code (0 guild text, 1 DM, 2 voice, 3 group DM, 4 category, ...).
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub recipients: Vec<NativeUser>,
}

impl NativeChannel {
    pub fn new(id: impl Into<String>, kind: u8) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            guild_id: None,
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAttachment {
    pub id: String,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: NativeUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<NativeAttachment>,
}

/// What a send call produced: Discord answers with one message, other bindings may batch.
#[derive(Debug, Clone)]
pub enum SentMessages {
    One(NativeMessage),
    Many(Vec<NativeMessage>),
}

impl SentMessages {
    pub fn into_vec(self) -> Vec<NativeMessage> {
        match self {
            SentMessages::One(message) => vec![message],
            SentMessages::Many(messages) => messages,
        }
    }
}

/// File to upload with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub data: Vec<u8>,
}

/// Visual embed: title linking to `url`, with a large image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub image_url: String,
}

/// Body of one platform send call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingPayload {
    pub content: String,
    pub file: Option<FileUpload>,
    pub embed: Option<Embed>,
}

impl OutgoingPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_file(content: impl Into<String>, name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content: content.into(),
            file: Some(FileUpload {
                name: name.into(),
                data,
            }),
            embed: None,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            content: String::new(),
            file: None,
            embed: Some(embed),
        }
    }
}
