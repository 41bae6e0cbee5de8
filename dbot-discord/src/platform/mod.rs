//! Seam to the Discord client: everything the adapter needs from the platform, and nothing else.
//!
//! [`HttpPlatform`] is the production binding (REST + gateway). Tests substitute their own
//! [`Platform`] through a [`PlatformFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::Result;
use tokio::sync::mpsc;

use crate::config::DiscordConfig;

mod gateway;
mod http;
pub mod native;

pub use http::{HttpPlatform, HttpPlatformFactory};
pub use native::{
    Embed, FileUpload, NativeAttachment, NativeChannel, NativeMessage, NativeUser,
    OutgoingPayload, SentMessages,
};

/// Events the platform pushes to its subscriber.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Login finished; carries the account the session runs as.
    Ready(NativeUser),
    MessageCreate(NativeMessage),
    /// The connection dropped and a new one is being set up; the next `Ready` completes it.
    Reconnecting,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Registers the event listener. Must be called before [`Platform::login`]; the previous
    /// receiver, if any, stops receiving.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<GatewayEvent>;

    /// Starts authentication. Completion is signalled by [`GatewayEvent::Ready`].
    async fn login(&self, token: &str) -> Result<()>;

    async fn fetch_channel(&self, channel_id: &str) -> Result<NativeChannel>;

    /// Opens (or returns the existing) direct-message channel with a user.
    async fn create_dm(&self, user_id: &str) -> Result<NativeChannel>;

    async fn guild_members(&self, guild_id: &str) -> Result<Vec<NativeUser>>;

    async fn send(&self, channel_id: &str, payload: OutgoingPayload) -> Result<SentMessages>;

    async fn edit(&self, channel_id: &str, message_id: &str, text: &str) -> Result<NativeMessage>;

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<()>;

    async fn start_typing(&self, channel_id: &str) -> Result<()>;

    /// Discord clears the indicator on its own once a message lands.
    async fn stop_typing(&self, _channel_id: &str) -> Result<()> {
        Ok(())
    }

    /// Closes the connection. The instance is not reused afterwards.
    async fn destroy(&self) -> Result<()>;
}

/// Builds a fresh platform client for every session.
pub trait PlatformFactory: Send + Sync {
    fn create(&self, config: &DiscordConfig) -> Result<Arc<dyn Platform>>;
}
