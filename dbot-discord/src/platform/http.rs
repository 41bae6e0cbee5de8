//! Production [`Platform`]: Discord REST v10 via reqwest, inbound events via the gateway WebSocket.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{DbotError, Result};
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::gateway;
use super::native::{NativeChannel, NativeMessage, NativeUser, OutgoingPayload, SentMessages};
use super::{GatewayEvent, Platform, PlatformFactory};
use crate::config::DiscordConfig;

const GUILD_MEMBER_LIMIT: u32 = 1000;

pub struct HttpPlatform {
    client: Client,
    api_base: String,
    token: Mutex<Option<String>>,
    events: Mutex<Option<mpsc::UnboundedSender<GatewayEvent>>>,
    gateway: Mutex<Option<JoinHandle<()>>>,
}

impl HttpPlatform {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(DbotError::Config("bot token is empty".to_string()));
        }
        let client = Client::builder().build().map_err(DbotError::platform)?;
        Ok(Self {
            client,
            api_base: config.api_base().to_string(),
            token: Mutex::new(None),
            events: Mutex::new(None),
            gateway: Mutex::new(None),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token.lock().clone().ok_or(DbotError::NotConnected)?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {token}")))
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await.map_err(DbotError::platform)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DbotError::Platform(format!(
            "Discord {what} failed ({status}): {body}"
        )))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.execute(request, what)
            .await?
            .json::<T>()
            .await
            .map_err(DbotError::platform)
    }
}

fn message_body(payload: &OutgoingPayload) -> Value {
    let mut body = json!({ "content": payload.content });
    if let Some(embed) = &payload.embed {
        body["embeds"] = json!([{
            "title": embed.title,
            "url": embed.url,
            "image": { "url": embed.image_url },
        }]);
    }
    body
}

#[derive(Deserialize)]
struct GuildMember {
    user: NativeUser,
}

#[async_trait]
impl Platform for HttpPlatform {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<GatewayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        rx
    }

    #[instrument(skip(self, token))]
    async fn login(&self, token: &str) -> Result<()> {
        // The gateway task owns the only sender, so the stream closes when supervision ends.
        let events = self
            .events
            .lock()
            .take()
            .ok_or_else(|| DbotError::Platform("login before subscribe".to_string()))?;
        *self.token.lock() = Some(token.to_string());

        let url = gateway::fetch_gateway_url(&self.client, &self.api_base, token).await?;
        info!(gateway_url = %url, "Connecting to Discord gateway");

        let handle = tokio::spawn(gateway::supervise(
            self.client.clone(),
            self.api_base.clone(),
            token.to_string(),
            url,
            events,
        ));
        if let Some(previous) = self.gateway.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<NativeChannel> {
        let request = self.request(Method::GET, &format!("/channels/{channel_id}"))?;
        self.execute_json(request, "fetch channel").await
    }

    async fn create_dm(&self, user_id: &str) -> Result<NativeChannel> {
        let request = self
            .request(Method::POST, "/users/@me/channels")?
            .json(&json!({ "recipient_id": user_id }));
        self.execute_json(request, "create DM").await
    }

    async fn guild_members(&self, guild_id: &str) -> Result<Vec<NativeUser>> {
        let request = self.request(
            Method::GET,
            &format!("/guilds/{guild_id}/members?limit={GUILD_MEMBER_LIMIT}"),
        )?;
        let members: Vec<GuildMember> = self.execute_json(request, "list guild members").await?;
        Ok(members.into_iter().map(|m| m.user).collect())
    }

    async fn send(&self, channel_id: &str, payload: OutgoingPayload) -> Result<SentMessages> {
        let request = self.request(Method::POST, &format!("/channels/{channel_id}/messages"))?;
        let body = message_body(&payload);

        let request = match payload.file {
            Some(file) => {
                debug!(channel_id = %channel_id, file = %file.name, "Uploading attachment");
                let part = Part::bytes(file.data).file_name(file.name);
                let form = Form::new()
                    .text("payload_json", body.to_string())
                    .part("files[0]", part);
                request.multipart(form)
            }
            None => request.json(&body),
        };

        let message: NativeMessage = self.execute_json(request, "send message").await?;
        Ok(SentMessages::One(message))
    }

    async fn edit(&self, channel_id: &str, message_id: &str, text: &str) -> Result<NativeMessage> {
        let request = self
            .request(
                Method::PATCH,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            )?
            .json(&json!({ "content": text }));
        self.execute_json(request, "edit message").await
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let request = self.request(
            Method::DELETE,
            &format!("/channels/{channel_id}/messages/{message_id}"),
        )?;
        self.execute(request, "delete message").await?;
        Ok(())
    }

    async fn start_typing(&self, channel_id: &str) -> Result<()> {
        let request = self.request(Method::POST, &format!("/channels/{channel_id}/typing"))?;
        self.execute(request, "trigger typing").await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        if let Some(handle) = self.gateway.lock().take() {
            handle.abort();
        }
        self.events.lock().take();
        self.token.lock().take();
        info!("Discord gateway connection closed");
        Ok(())
    }
}

/// Creates an [`HttpPlatform`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpPlatformFactory;

impl PlatformFactory for HttpPlatformFactory {
    fn create(&self, config: &DiscordConfig) -> Result<Arc<dyn Platform>> {
        Ok(Arc::new(HttpPlatform::new(config)?))
    }
}
