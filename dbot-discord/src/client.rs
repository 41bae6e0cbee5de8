//! [`DiscordClient`]: the [`dbot_core::Client`] implementation for Discord.
//!
//! Every `start` builds a new [`Session`] (fresh platform client, empty identity cache); `stop` tears
//! it down. Inbound messages are wrapped and fed to the installed [`Handler`] by a pump task.
//!
//! The pump also follows the connection: a gateway reconnect moves the state back to Connecting
//! until the next ready signal, and an event stream that ends for good tears the session down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dbot_core::{
    Channel, Client, ClientUser, DbotError, Handler, HandlerResponse, Result, TemplateHandler,
    User, UserMessage,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters;
use crate::config::DiscordConfig;
use crate::platform::{
    GatewayEvent, HttpPlatformFactory, NativeMessage, PlatformFactory, SentMessages,
};
use crate::session::{self, Session, SessionState};
use crate::template_handler::{AttachmentTemplateHandler, TitledLinkImageTemplateHandler};

type HandlerSlot = Arc<RwLock<Option<Arc<dyn Handler>>>>;

pub(crate) struct ClientInner {
    config: DiscordConfig,
    factory: Arc<dyn PlatformFactory>,
    state: RwLock<SessionState>,
    session: RwLock<Option<Arc<Session>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    handler: HandlerSlot,
    /// Serializes start and stop.
    lifecycle: tokio::sync::Mutex<()>,
    /// Bumped by every start and stop; a connect whose ticket is stale is discarded.
    epoch: AtomicU64,
    /// Wakes a start that is still waiting for the ready signal.
    cancel: Notify,
}

impl ClientInner {
    /// The current session, or `NotConnected` outside Connected.
    pub(crate) fn active_session(&self) -> Result<Arc<Session>> {
        self.session
            .read()
            .clone()
            .filter(|session| session.is_active())
            .ok_or(DbotError::NotConnected)
    }

    fn owns(&self, session: &Arc<Session>) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    /// Moves `from` to `to` if `session` is still the current one.
    fn transition(&self, session: &Arc<Session>, from: SessionState, to: SessionState) -> bool {
        if !self.owns(session) {
            return false;
        }
        let mut state = self.state.write();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Called by the pump once the event stream is gone: nothing will arrive any more, so the
    /// session ends as if stopped.
    async fn drop_session(&self, session: &Arc<Session>) {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.owns(session) {
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.state.write() = SessionState::Disconnected;
        self.session.write().take();
        // Our own handle; dropping it detaches the running pump.
        self.pump.lock().take();
        session::teardown(session).await;
        warn!("Discord event stream ended, client disconnected");
    }
}

pub struct DiscordClient {
    inner: Arc<ClientInner>,
    rich_handlers: Vec<Arc<dyn TemplateHandler>>,
}

impl DiscordClient {
    /// Client backed by the Discord REST API and gateway.
    pub fn new(config: DiscordConfig) -> Self {
        Self::with_factory(config, Arc::new(HttpPlatformFactory))
    }

    /// Client whose sessions use platform instances from `factory`.
    pub fn with_factory(config: DiscordConfig, factory: Arc<dyn PlatformFactory>) -> Self {
        let inner = Arc::new(ClientInner {
            config,
            factory,
            state: RwLock::new(SessionState::Disconnected),
            session: RwLock::new(None),
            pump: Mutex::new(None),
            handler: Arc::new(RwLock::new(None)),
            lifecycle: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            cancel: Notify::new(),
        });
        let rich_handlers: Vec<Arc<dyn TemplateHandler>> = vec![
            Arc::new(AttachmentTemplateHandler::new(Arc::downgrade(&inner))),
            Arc::new(TitledLinkImageTemplateHandler::new(Arc::downgrade(&inner))),
        ];
        Self {
            inner,
            rich_handlers,
        }
    }

    /// Installs the inbound handler. Takes effect for the next message, across restarts.
    pub fn set_handler(&self, handler: Arc<dyn Handler>) {
        *self.inner.handler.write() = Some(handler);
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Resolves a channel by id through the identity cache.
    pub async fn fetch_channel(&self, channel_id: &str) -> Result<Arc<dyn Channel>> {
        let session = self.inner.active_session()?;
        let channel: Arc<dyn Channel> = session.channel_by_id(channel_id).await?;
        Ok(channel)
    }

    pub async fn wrap_message(&self, native: NativeMessage) -> Result<Arc<dyn UserMessage>> {
        let session = self.inner.active_session()?;
        adapters::wrap_message(&session, native).await
    }

    pub async fn wrap_sent_result(&self, sent: SentMessages) -> Result<Vec<Arc<dyn UserMessage>>> {
        let session = self.inner.active_session()?;
        adapters::wrap_sent_result(&session, sent).await
    }

    /// Sends `text` to the direct conversation with `user`, opening it if needed.
    #[instrument(skip(self, text, user), fields(user_id = %user.identity_id()))]
    pub async fn send_direct_text(
        &self,
        text: &str,
        user: &Arc<dyn User>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        let session = self.inner.active_session()?;
        let user = session.owned_user(user)?;
        let dm = user.dm_channel().await?;
        let channel = session.owned_channel(&dm)?;
        session.send_text(&channel, text).await
    }
}

#[async_trait]
impl Client for DiscordClient {
    fn client_id(&self) -> &str {
        "discord"
    }

    fn client_name(&self) -> &str {
        "Discord"
    }

    fn started(&self) -> bool {
        self.state() == SessionState::Connected
    }

    fn channel_list(&self) -> Vec<Arc<dyn Channel>> {
        let Ok(session) = self.inner.active_session() else {
            return Vec::new();
        };
        session
            .cache()
            .channels()
            .into_iter()
            .map(|channel| -> Arc<dyn Channel> { channel })
            .collect()
    }

    fn client_user(&self) -> Option<Arc<dyn ClientUser>> {
        let session = self.inner.active_session().ok()?;
        let me: Arc<dyn ClientUser> = session.self_user().clone();
        Some(me)
    }

    fn rich_handlers(&self) -> &[Arc<dyn TemplateHandler>] {
        &self.rich_handlers
    }

    /// Connects a fresh session. A `stop` issued while this waits for the ready signal cancels it;
    /// the start then fails with `NotConnected`.
    #[instrument(skip(self))]
    async fn start(&self) -> Result<()> {
        let (platform, ticket, cancelled) = {
            let _lifecycle = self.inner.lifecycle.lock().await;
            let state = self.state();
            if state != SessionState::Disconnected {
                debug!(?state, "Start ignored");
                return Ok(());
            }
            let platform = self.inner.factory.create(&self.inner.config)?;
            *self.inner.state.write() = SessionState::Connecting;
            let ticket = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            (platform, ticket, self.inner.cancel.notified())
        };

        let outcome = tokio::select! {
            result = session::connect(platform.clone(), &self.inner.config.bot_token) => Some(result),
            _ = cancelled => None,
        };

        let _lifecycle = self.inner.lifecycle.lock().await;
        let current = self.inner.epoch.load(Ordering::SeqCst) == ticket;
        let (session, events) = match outcome {
            Some(Ok(connected)) if current => connected,
            Some(Ok((session, _))) => {
                session::teardown(&session).await;
                info!("Start cancelled by stop");
                return Err(DbotError::NotConnected);
            }
            Some(Err(e)) => {
                if current {
                    *self.inner.state.write() = SessionState::Disconnected;
                }
                error!(error = %e, "Discord login failed");
                return Err(e);
            }
            None => {
                if let Err(e) = platform.destroy().await {
                    warn!(error = %e, "Platform teardown failed");
                }
                info!("Start cancelled by stop");
                return Err(DbotError::NotConnected);
            }
        };

        *self.inner.session.write() = Some(session.clone());
        *self.inner.state.write() = SessionState::Connected;
        let pump = tokio::spawn(pump_events(Arc::downgrade(&self.inner), session, events));
        *self.inner.pump.lock() = Some(pump);
        info!("Discord client started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.state() == SessionState::Disconnected {
            debug!("Stop ignored, already disconnected");
            return Ok(());
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        *self.inner.state.write() = SessionState::Disconnected;
        self.inner.cancel.notify_waiters();

        let pump = self.inner.pump.lock().take();
        if let Some(pump) = pump {
            pump.abort();
        }
        let session = self.inner.session.write().take();
        if let Some(session) = session {
            session::teardown(&session).await;
        }
        info!("Discord client stopped");
        Ok(())
    }

    #[instrument(skip(self, text, channel), fields(channel_id = %channel.identity_id()))]
    async fn send_text(
        &self,
        text: &str,
        channel: &Arc<dyn Channel>,
    ) -> Result<Vec<Arc<dyn UserMessage>>> {
        let session = self.inner.active_session()?;
        let channel = session.owned_channel(channel)?;
        session.send_text(&channel, text).await
    }
}

/// Feeds each inbound message to the handler, one at a time. Failures are logged and skipped.
async fn pump_events(
    client: Weak<ClientInner>,
    session: Arc<Session>,
    mut events: mpsc::UnboundedReceiver<GatewayEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = client.upgrade() else {
            return;
        };
        let native = match event {
            GatewayEvent::MessageCreate(native) => native,
            GatewayEvent::Reconnecting => {
                if inner.transition(&session, SessionState::Connected, SessionState::Connecting) {
                    warn!("Discord connection lost, reconnecting");
                }
                continue;
            }
            GatewayEvent::Ready(_) => {
                if inner.transition(&session, SessionState::Connecting, SessionState::Connected) {
                    info!("Discord connection resumed");
                }
                continue;
            }
        };
        if !session.is_active() {
            return;
        }

        let message = match adapters::wrap_message(&session, native).await {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to wrap inbound message");
                continue;
            }
        };
        info!(
            message_id = %message.id(),
            channel_id = %message.channel().identity_id(),
            user_id = %message.sender().identity_id(),
            "Received message"
        );

        let current = inner.handler.read().clone();
        let Some(current) = current else {
            continue;
        };
        match current.handle(&message).await {
            Ok(HandlerResponse::Continue) => {}
            Ok(HandlerResponse::Reply(text)) => {
                if let Err(e) = reply(&session, &message, &text).await {
                    error!(error = %e, message_id = %message.id(), "Reply failed");
                }
            }
            Err(e) => error!(error = %e, message_id = %message.id(), "Handler failed"),
        }
    }

    if let Some(inner) = client.upgrade() {
        inner.drop_session(&session).await;
    }
}

async fn reply(session: &Arc<Session>, message: &Arc<dyn UserMessage>, text: &str) -> Result<()> {
    let channel = session.owned_channel(message.channel())?;
    session.send_text(&channel, text).await?;
    Ok(())
}
