//! Client abstraction: one connection to a chat transport.
//!
//! [`Client`] is transport-agnostic; transports (e.g. dbot-discord) implement it and register their
//! [`TemplateHandler`]s.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DbotError, Result};
use crate::template::{RichMessageTemplate, TemplateHandler};
use crate::types::{Channel, ClientUser, UserMessage};

#[async_trait]
pub trait Client: Send + Sync {
    /// Stable machine name of the transport (e.g. `"discord"`).
    fn client_id(&self) -> &str;
    /// Human readable transport name.
    fn client_name(&self) -> &str;
    fn started(&self) -> bool;
    /// Channels seen during the current session.
    fn channel_list(&self) -> Vec<Arc<dyn Channel>>;
    /// The logged-in account; `None` while disconnected.
    fn client_user(&self) -> Option<Arc<dyn ClientUser>>;
    fn rich_handlers(&self) -> &[Arc<dyn TemplateHandler>];

    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;

    /// Sends plain text. May produce several messages when the transport limits message length.
    async fn send_text(
        &self,
        text: &str,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>>;

    /// Sends a rich template through the first registered handler that accepts it.
    async fn send_rich_template(
        &self,
        template: &RichMessageTemplate,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        for handler in self.rich_handlers() {
            if handler.can_handle(template) {
                debug!(client = %self.client_id(), template = %template, "template handler selected");
                return handler.send(template, channel).await;
            }
        }
        Err(DbotError::UnsupportedTemplate(template.to_string()))
    }
}
