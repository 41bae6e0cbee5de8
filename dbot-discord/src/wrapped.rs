//! Wrapper objects around native Discord users, channels and messages.
//!
//! Users and channels are owned by the session's [`IdentityCache`](crate::cache::IdentityCache) and
//! hold only a weak reference back to their session; once the session stops, platform-backed calls
//! on them fail with [`DbotError::NotConnected`].

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbot_core::{Channel, ClientUser, DbotError, MessageAttachment, Result, User, UserMessage};
use tracing::{debug, warn};

use crate::adapters;
use crate::kind::ChannelKind;
use crate::platform::{NativeChannel, NativeUser};
use crate::session::{live, Session};

#[derive(Debug)]
pub struct DiscordUser {
    native: NativeUser,
    session: Weak<Session>,
}

impl DiscordUser {
    pub(crate) fn new(native: NativeUser, session: Weak<Session>) -> Self {
        Self { native, session }
    }

    /// Snapshot taken when the user was first seen in this session.
    pub fn native(&self) -> &NativeUser {
        &self.native
    }
}

#[async_trait]
impl User for DiscordUser {
    fn identity_id(&self) -> &str {
        &self.native.id
    }

    fn name(&self) -> String {
        self.native.username.clone()
    }

    fn has_dm_channel(&self) -> bool {
        true
    }

    fn has_avatar(&self) -> bool {
        true
    }

    async fn avatar_url(&self) -> Result<Option<String>> {
        Ok(self.native.avatar_url())
    }

    async fn dm_channel(&self) -> Result<Arc<dyn Channel>> {
        let session = live(&self.session)?;
        let channel: Arc<dyn Channel> =
            match session.cache().direct_channel_with(&self.native.id) {
                Some(channel) => channel,
                None => {
                    debug!(user_id = %self.native.id, "Opening DM channel");
                    let native = session.platform().create_dm(&self.native.id).await?;
                    session.adopt_channel(native)
                }
            };
        Ok(channel)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The account this session is logged in as.
#[derive(Debug)]
pub struct DiscordClientUser {
    native: NativeUser,
    session: Weak<Session>,
}

impl DiscordClientUser {
    pub(crate) fn new(native: NativeUser, session: Weak<Session>) -> Self {
        Self { native, session }
    }

    pub fn native(&self) -> &NativeUser {
        &self.native
    }
}

#[async_trait]
impl User for DiscordClientUser {
    fn identity_id(&self) -> &str {
        &self.native.id
    }

    fn name(&self) -> String {
        self.native.username.clone()
    }

    fn has_dm_channel(&self) -> bool {
        false
    }

    fn has_avatar(&self) -> bool {
        self.native.avatar.is_some()
    }

    async fn avatar_url(&self) -> Result<Option<String>> {
        Ok(self.native.avatar_url())
    }

    async fn dm_channel(&self) -> Result<Arc<dyn Channel>> {
        Err(DbotError::NoDmChannel(self.native.id.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ClientUser for DiscordClientUser {
    fn connected(&self) -> bool {
        self.session
            .upgrade()
            .map(|session| session.is_active())
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct DiscordChannel {
    native: NativeChannel,
    kind: ChannelKind,
    session: Weak<Session>,
}

impl DiscordChannel {
    pub(crate) fn new(native: NativeChannel, session: Weak<Session>) -> Self {
        let kind = ChannelKind::from_code(native.kind);
        Self {
            native,
            kind,
            session,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn native(&self) -> &NativeChannel {
        &self.native
    }

    /// The other party of a direct conversation.
    pub fn recipient_id(&self) -> Option<&str> {
        match self.kind {
            ChannelKind::Direct => self.native.recipients.first().map(|u| u.id.as_str()),
            _ => None,
        }
    }

    fn adopt_all(&self, natives: &[NativeUser]) -> Result<Vec<Arc<dyn User>>> {
        let session = live(&self.session)?;
        Ok(natives.iter().map(|u| session.adopt_user(u)).collect())
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn identity_id(&self) -> &str {
        &self.native.id
    }

    fn name(&self) -> String {
        let name = match self.kind {
            ChannelKind::Direct => self.native.recipients.first().map(|u| u.username.clone()),
            ChannelKind::Unknown => None,
            _ => self.native.name.clone(),
        };
        name.unwrap_or_else(|| self.native.id.clone())
    }

    /// Guild channels report the whole guild's member list (first 1000), not only the members
    /// permitted to view this channel. Direct and group conversations report their recipients.
    async fn members(&self) -> Result<Vec<Arc<dyn User>>> {
        match self.kind {
            kind if kind.is_guild() => {
                let Some(guild_id) = self.native.guild_id.as_deref() else {
                    warn!(channel_id = %self.native.id, "Guild channel without guild id");
                    return Ok(Vec::new());
                };
                let session = live(&self.session)?;
                let natives = session.platform().guild_members(guild_id).await?;
                Ok(natives.iter().map(|u| session.adopt_user(u)).collect())
            }
            ChannelKind::Group => self.adopt_all(&self.native.recipients),
            ChannelKind::Direct => {
                let recipient = self.native.recipients.get(..1).unwrap_or_default();
                self.adopt_all(recipient)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Message snapshot. Built fresh for every event and every send response.
#[derive(Debug)]
pub struct DiscordMessage {
    pub(crate) id: String,
    pub(crate) channel_id: String,
    pub(crate) sender: Arc<dyn User>,
    pub(crate) channel: Arc<dyn Channel>,
    pub(crate) text: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) attachments: Vec<MessageAttachment>,
    pub(crate) editable: bool,
    pub(crate) deletable: bool,
    pub(crate) session: Weak<Session>,
}

#[async_trait]
impl UserMessage for DiscordMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn sender(&self) -> &Arc<dyn User> {
        &self.sender
    }

    fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn attachments(&self) -> &[MessageAttachment] {
        &self.attachments
    }

    fn editable(&self) -> bool {
        self.editable
    }

    fn deletable(&self) -> bool {
        self.deletable
    }

    async fn edit_text(&self, text: &str) -> Result<Arc<dyn UserMessage>> {
        let session = live(&self.session)?;
        let native = session
            .platform()
            .edit(&self.channel_id, &self.id, text)
            .await?;
        adapters::wrap_message(&session, native).await
    }

    async fn delete(&self) -> bool {
        let Ok(session) = live(&self.session) else {
            return false;
        };
        match session.platform().delete(&self.channel_id, &self.id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(message_id = %self.id, error = %e, "Delete rejected");
                false
            }
        }
    }
}
