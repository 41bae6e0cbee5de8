//! Rich (multi-part) outbound message templates and the handler trait transports implement for them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Channel, MessageAttachment, UserMessage};

/// Caption plus an ordered list of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTemplate {
    pub text: String,
    pub attachments: Vec<MessageAttachment>,
}

impl AttachmentTemplate {
    pub fn new(text: impl Into<String>, attachments: Vec<MessageAttachment>) -> Self {
        Self {
            text: text.into(),
            attachments,
        }
    }
}

/// A titled link rendered together with a preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitledLinkImageTemplate {
    pub title: String,
    pub link_url: String,
    pub image_url: String,
}

impl TitledLinkImageTemplate {
    pub fn new(
        title: impl Into<String>,
        link_url: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link_url: link_url.into(),
            image_url: image_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichMessageTemplate {
    Attachment(AttachmentTemplate),
    TitledLinkImage(TitledLinkImageTemplate),
}

impl RichMessageTemplate {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RichMessageTemplate::Attachment(_) => "attachment",
            RichMessageTemplate::TitledLinkImage(_) => "titled_link_image",
        }
    }
}

impl fmt::Display for RichMessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_name())
    }
}

impl From<AttachmentTemplate> for RichMessageTemplate {
    fn from(template: AttachmentTemplate) -> Self {
        RichMessageTemplate::Attachment(template)
    }
}

impl From<TitledLinkImageTemplate> for RichMessageTemplate {
    fn from(template: TitledLinkImageTemplate) -> Self {
        RichMessageTemplate::TitledLinkImage(template)
    }
}

/// Sends one family of rich templates. A client keeps a list of these and picks the first that
/// `can_handle` a given template.
#[async_trait]
pub trait TemplateHandler: Send + Sync {
    fn can_handle(&self, template: &RichMessageTemplate) -> bool;

    async fn send(
        &self,
        template: &RichMessageTemplate,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>>;
}
