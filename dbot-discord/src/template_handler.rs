//! Rich template handlers registered on [`DiscordClient`](crate::DiscordClient).

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dbot_core::{
    AttachmentTemplate, Channel, DbotError, MessageAttachment, Result, RichMessageTemplate,
    TemplateHandler, TitledLinkImageTemplate, UserMessage,
};
use tracing::instrument;

use crate::client::ClientInner;
use crate::kind::Capability;
use crate::platform::{Embed, OutgoingPayload};

fn upgrade(client: &Weak<ClientInner>) -> Result<Arc<ClientInner>> {
    client.upgrade().ok_or(DbotError::NotConnected)
}

/// One payload per attachment. Only the first carries the caption.
fn attachment_payloads(template: &AttachmentTemplate) -> Vec<OutgoingPayload> {
    template
        .attachments
        .iter()
        .enumerate()
        .map(|(idx, attachment)| {
            let caption = if idx == 0 { template.text.as_str() } else { "" };
            attachment_payload(caption, attachment)
        })
        .collect()
}

fn attachment_payload(caption: &str, attachment: &MessageAttachment) -> OutgoingPayload {
    if let Some(buffer) = &attachment.buffer {
        return OutgoingPayload::with_file(caption, attachment.name.clone(), buffer.clone());
    }
    // Nothing to upload: link the remote file instead.
    let reference = attachment.url.as_deref().unwrap_or(&attachment.name);
    if caption.is_empty() {
        OutgoingPayload::text(reference)
    } else {
        OutgoingPayload::text(format!("{caption}\n{reference}"))
    }
}

/// Sends [`AttachmentTemplate`]s: N attachments make N sends, in order.
pub struct AttachmentTemplateHandler {
    client: Weak<ClientInner>,
}

impl AttachmentTemplateHandler {
    pub(crate) fn new(client: Weak<ClientInner>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateHandler for AttachmentTemplateHandler {
    fn can_handle(&self, template: &RichMessageTemplate) -> bool {
        matches!(template, RichMessageTemplate::Attachment(_))
    }

    #[instrument(skip_all, fields(channel_id = %channel.identity_id()))]
    async fn send(
        &self,
        template: &RichMessageTemplate,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        let RichMessageTemplate::Attachment(template) = template else {
            return Err(DbotError::UnsupportedTemplate(template.to_string()));
        };
        let session = upgrade(&self.client)?.active_session()?;
        let channel = session.owned_channel(channel)?;
        session.require(&channel, Capability::Attachment)?;
        session
            .send_payloads(&channel, attachment_payloads(template))
            .await
    }
}

/// Sends a [`TitledLinkImageTemplate`] as a single embed.
pub struct TitledLinkImageTemplateHandler {
    client: Weak<ClientInner>,
}

impl TitledLinkImageTemplateHandler {
    pub(crate) fn new(client: Weak<ClientInner>) -> Self {
        Self { client }
    }
}

fn embed_payload(template: &TitledLinkImageTemplate) -> OutgoingPayload {
    OutgoingPayload::embed(Embed {
        title: template.title.clone(),
        url: template.link_url.clone(),
        image_url: template.image_url.clone(),
    })
}

#[async_trait]
impl TemplateHandler for TitledLinkImageTemplateHandler {
    fn can_handle(&self, template: &RichMessageTemplate) -> bool {
        matches!(template, RichMessageTemplate::TitledLinkImage(_))
    }

    #[instrument(skip_all, fields(channel_id = %channel.identity_id()))]
    async fn send(
        &self,
        template: &RichMessageTemplate,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        let RichMessageTemplate::TitledLinkImage(template) = template else {
            return Err(DbotError::UnsupportedTemplate(template.to_string()));
        };
        let session = upgrade(&self.client)?.active_session()?;
        let channel = session.owned_channel(channel)?;
        session.require(&channel, Capability::Embed)?;
        session
            .send_payloads(&channel, vec![embed_payload(template)])
            .await
    }
}
