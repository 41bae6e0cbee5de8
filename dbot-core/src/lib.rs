//! # dbot-core
//!
//! Core contracts for chat-bot transports: [`Client`], [`User`], [`Channel`], [`UserMessage`], rich
//! message templates with their [`TemplateHandler`], the inbound [`Handler`], the [`DbotError`]
//! taxonomy and tracing initialization. Transport-agnostic; implemented by dbot-discord.

pub mod client;
pub mod error;
pub mod logger;
pub mod template;
pub mod types;

pub use client::Client;
pub use error::{DbotError, Result};
pub use logger::init_tracing;
pub use template::{
    AttachmentTemplate, RichMessageTemplate, TemplateHandler, TitledLinkImageTemplate,
};
pub use types::{
    AttachmentKind, Channel, ClientUser, Handler, HandlerResponse, MessageAttachment, User,
    UserMessage,
};
