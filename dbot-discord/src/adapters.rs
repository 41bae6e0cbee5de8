//! Adapters from native Discord payloads to dbot_core wrappers.
//! Users and channels go through the session's identity cache; messages are built fresh.

use std::sync::Arc;

use dbot_core::{AttachmentKind, Channel, MessageAttachment, Result, UserMessage};

use crate::platform::{NativeAttachment, NativeMessage, SentMessages};
use crate::session::Session;
use crate::wrapped::DiscordMessage;

/// Media class from the file name suffix. Matching is case-sensitive.
pub fn classify_attachment(filename: &str) -> AttachmentKind {
    if filename.ends_with(".png") || filename.ends_with(".jpg") {
        AttachmentKind::Image
    } else if filename.ends_with(".mp4") {
        AttachmentKind::Video
    } else {
        AttachmentKind::File
    }
}

fn wrap_attachment(native: &NativeAttachment) -> MessageAttachment {
    MessageAttachment::from_url(
        classify_attachment(&native.filename),
        native.filename.clone(),
        native.url.clone(),
    )
}

/// Wraps a native message. The channel is fetched from the platform only on first sighting.
pub(crate) async fn wrap_message(
    session: &Arc<Session>,
    native: NativeMessage,
) -> Result<Arc<dyn UserMessage>> {
    let channel = session.channel_by_id(&native.channel_id).await?;
    let sender = session.adopt_user(&native.author);

    let from_self = session.cache().is_self(&native.author.id);
    let deletable = from_self || channel.kind().is_guild();
    let attachments = native.attachments.iter().map(wrap_attachment).collect();
    let channel: Arc<dyn Channel> = channel;

    let message: Arc<dyn UserMessage> = Arc::new(DiscordMessage {
        id: native.id,
        channel_id: native.channel_id,
        sender,
        channel,
        text: native.content,
        created_at: native.timestamp,
        attachments,
        editable: from_self,
        deletable,
        session: Arc::downgrade(session),
    });
    Ok(message)
}

/// Wraps whatever a send call produced, keeping the platform's order.
pub(crate) async fn wrap_sent_result(
    session: &Arc<Session>,
    sent: SentMessages,
) -> Result<Vec<Arc<dyn UserMessage>>> {
    let mut wrapped = Vec::new();
    for native in sent.into_vec() {
        wrapped.push(wrap_message(session, native).await?);
    }
    Ok(wrapped)
}
