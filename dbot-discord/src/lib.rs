//! # dbot-discord
//!
//! Discord transport for dbot: wraps Discord users, channels and messages as dbot_core entities,
//! dispatches outbound text and rich templates, and manages the login session.
//! Talks to Discord only through the [`Platform`] seam; no persistence or bot logic.

mod adapters;
mod cache;
mod chunk;
mod client;
mod config;
mod dispatcher;
mod kind;
pub mod platform;
mod runner;
mod session;
mod template_handler;
mod wrapped;

pub use adapters::classify_attachment;
pub use cache::{IdentityCache, KeyedStore, MemoryStore};
pub use chunk::{split_message, MAX_MESSAGE_LEN};
pub use client::DiscordClient;
pub use config::{DiscordConfig, DEFAULT_API_BASE};
pub use kind::{Capability, ChannelKind};
pub use platform::{GatewayEvent, Platform, PlatformFactory};
pub use runner::run_until_shutdown;
pub use session::SessionState;
pub use template_handler::{AttachmentTemplateHandler, TitledLinkImageTemplateHandler};
pub use wrapped::{DiscordChannel, DiscordClientUser, DiscordMessage, DiscordUser};
