//! Outbound dispatch: ownership checks, channel eligibility, chunking and sequential sends.

use std::sync::Arc;

use dbot_core::{Channel, DbotError, Result, User, UserMessage};
use tracing::{debug, instrument, warn};

use crate::adapters;
use crate::chunk::{split_message, MAX_MESSAGE_LEN};
use crate::kind::Capability;
use crate::platform::OutgoingPayload;
use crate::session::Session;
use crate::wrapped::{DiscordChannel, DiscordClientUser, DiscordUser};

impl Session {
    /// The cached wrapper behind `channel`, if it was produced by this session.
    pub(crate) fn owned_channel(&self, channel: &Arc<dyn Channel>) -> Result<Arc<DiscordChannel>> {
        channel
            .as_any()
            .downcast_ref::<DiscordChannel>()
            .and_then(|channel| self.cache().owned_channel(channel))
            .ok_or_else(|| DbotError::ForeignChannel(channel.identity_id().to_string()))
    }

    pub(crate) fn owned_user(&self, user: &Arc<dyn User>) -> Result<Arc<DiscordUser>> {
        let any = user.as_any();
        if let Some(me) = any.downcast_ref::<DiscordClientUser>() {
            if std::ptr::eq(Arc::as_ptr(self.self_user()), me) {
                return Err(DbotError::NoDmChannel(me.identity_id().to_string()));
            }
        }
        any.downcast_ref::<DiscordUser>()
            .and_then(|user| self.cache().owned_user(user))
            .ok_or_else(|| DbotError::ForeignUser(user.identity_id().to_string()))
    }

    pub(crate) fn require(&self, channel: &DiscordChannel, capability: Capability) -> Result<()> {
        if channel.kind().supports(capability) {
            Ok(())
        } else {
            Err(DbotError::UnsendableChannel {
                channel: channel.identity_id().to_string(),
                capability: capability.as_str(),
            })
        }
    }

    /// Sends `text` split into chunks of at most [`MAX_MESSAGE_LEN`] characters.
    #[instrument(skip(self, text, channel), fields(channel_id = %channel.identity_id()))]
    pub(crate) async fn send_text(
        self: &Arc<Self>,
        channel: &DiscordChannel,
        text: &str,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.require(channel, Capability::Text)?;

        let payloads: Vec<OutgoingPayload> = split_message(text, MAX_MESSAGE_LEN)
            .into_iter()
            .map(OutgoingPayload::text)
            .collect();
        debug!(chunks = payloads.len(), "Sending text");
        self.send_payloads(channel, payloads).await
    }

    /// Sends payloads one after another under a typing indicator. The first failing send aborts
    /// the rest; messages already delivered stay delivered.
    pub(crate) async fn send_payloads(
        self: &Arc<Self>,
        channel: &DiscordChannel,
        payloads: Vec<OutgoingPayload>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }
        let channel_id = channel.identity_id();
        let platform = self.platform();

        if let Err(e) = platform.start_typing(channel_id).await {
            warn!(channel_id = %channel_id, error = %e, "Typing indicator failed");
        }

        let mut sent = Vec::with_capacity(payloads.len());
        let mut outcome = Ok(());
        for payload in payloads {
            match platform.send(channel_id, payload).await {
                Ok(result) => match adapters::wrap_sent_result(self, result).await {
                    Ok(messages) => sent.extend(messages),
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                },
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        if let Err(e) = platform.stop_typing(channel_id).await {
            debug!(channel_id = %channel_id, error = %e, "Stopping typing indicator failed");
        }
        outcome.map(|()| sent)
    }
}
