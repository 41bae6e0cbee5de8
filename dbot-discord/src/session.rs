//! One connected lifetime of a client: the platform instance, the identity cache and the self user.
//!
//! [`connect`] and [`teardown`] are the two halves of the lifecycle driven by
//! [`DiscordClient`](crate::DiscordClient).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dbot_core::{DbotError, Result, User};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::cache::IdentityCache;
use crate::platform::{GatewayEvent, NativeChannel, NativeUser, Platform};
use crate::wrapped::{DiscordChannel, DiscordClientUser, DiscordUser};

/// Connection state seen by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

pub(crate) struct Session {
    platform: Arc<dyn Platform>,
    cache: IdentityCache,
    active: AtomicBool,
}

impl Session {
    pub(crate) fn new(platform: Arc<dyn Platform>, me: NativeUser) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Session>| Session {
            platform,
            cache: IdentityCache::new(Arc::new(DiscordClientUser::new(me, weak.clone()))),
            active: AtomicBool::new(true),
        })
    }

    pub(crate) fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub(crate) fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub(crate) fn self_user(&self) -> &Arc<DiscordClientUser> {
        self.cache.self_user()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn adopt_user(self: &Arc<Self>, native: &NativeUser) -> Arc<dyn User> {
        let session = Arc::downgrade(self);
        self.cache
            .resolve_user(&native.id, || DiscordUser::new(native.clone(), session))
    }

    pub(crate) fn adopt_channel(self: &Arc<Self>, native: NativeChannel) -> Arc<DiscordChannel> {
        let session = Arc::downgrade(self);
        let id = native.id.clone();
        self.cache
            .resolve_channel(&id, move || DiscordChannel::new(native, session))
    }

    /// Cached channel, or fetched from the platform on first sighting.
    pub(crate) async fn channel_by_id(self: &Arc<Self>, channel_id: &str) -> Result<Arc<DiscordChannel>> {
        if let Some(channel) = self.cache.channel(channel_id) {
            return Ok(channel);
        }
        debug!(channel_id = %channel_id, "Fetching unseen channel");
        let native = self.platform.fetch_channel(channel_id).await?;
        Ok(self.adopt_channel(native))
    }
}

/// Upgrades a wrapper's back-reference; an ended session counts as disconnected.
pub(crate) fn live(session: &Weak<Session>) -> Result<Arc<Session>> {
    session
        .upgrade()
        .filter(|session| session.is_active())
        .ok_or(DbotError::NotConnected)
}

/// Registers the listener on a fresh platform client, logs in and waits for readiness.
/// Returns the new session together with the event stream that follows the ready signal.
/// On failure the platform is destroyed before the error is returned.
#[instrument(skip_all)]
pub(crate) async fn connect(
    platform: Arc<dyn Platform>,
    token: &str,
) -> Result<(Arc<Session>, mpsc::UnboundedReceiver<GatewayEvent>)> {
    let mut events = platform.subscribe();

    if let Err(e) = platform.login(token).await {
        let _ = platform.destroy().await;
        return Err(e);
    }

    let me = loop {
        match events.recv().await {
            Some(GatewayEvent::Ready(me)) => break me,
            Some(GatewayEvent::MessageCreate(message)) => {
                debug!(message_id = %message.id, "Dropping message received before ready");
            }
            Some(GatewayEvent::Reconnecting) => {
                debug!("Gateway reconnecting before ready");
            }
            None => {
                let _ = platform.destroy().await;
                return Err(DbotError::Platform(
                    "event stream closed before ready".to_string(),
                ));
            }
        }
    };

    info!(user_id = %me.id, username = %me.username, "Discord session ready");
    Ok((Session::new(platform, me), events))
}

/// Ends a session: later calls through its wrappers fail, the platform is destroyed and the cache is
/// cleared. A failing teardown is logged only; the cache is cleared regardless.
#[instrument(skip_all)]
pub(crate) async fn teardown(session: &Session) {
    session.deactivate();
    if let Err(e) = session.platform.destroy().await {
        warn!(error = %e, "Platform teardown failed");
    }
    session.cache.clear();
    info!("Discord session closed");
}
