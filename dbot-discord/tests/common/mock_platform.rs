//! Recording [`Platform`] for integration tests.
//!
//! Seeds a small Discord world: the bot account "1" (dbot), users "2" (alice) and "3" (bob), guild
//! "g1", and one channel of each interesting kind. Every call is recorded as a [`Call`] so tests can
//! assert on counts and order without hitting Discord.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dbot_core::{DbotError, Result};
use dbot_discord::platform::{
    NativeAttachment, NativeChannel, NativeMessage, NativeUser, OutgoingPayload, SentMessages,
};
use dbot_discord::{DiscordConfig, GatewayEvent, Platform, PlatformFactory};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const GUILD_TEXT: &str = "100";
pub const DIRECT_ALICE: &str = "101";
pub const GROUP: &str = "102";
pub const GUILD_VOICE: &str = "103";
pub const CATEGORY: &str = "104";
pub const UNKNOWN: &str = "105";

pub fn me() -> NativeUser {
    let mut user = NativeUser::new("1", "dbot");
    user.bot = true;
    user
}

pub fn alice() -> NativeUser {
    let mut user = NativeUser::new("2", "alice");
    user.avatar = Some("a1".to_string());
    user
}

pub fn bob() -> NativeUser {
    NativeUser::new("3", "bob")
}

fn channel(id: &str, kind: u8, name: Option<&str>, guild: Option<&str>, recipients: Vec<NativeUser>) -> NativeChannel {
    let mut channel = NativeChannel::new(id, kind);
    channel.name = name.map(str::to_string);
    channel.guild_id = guild.map(str::to_string);
    channel.recipients = recipients;
    channel
}

fn seed_channels() -> HashMap<String, NativeChannel> {
    [
        channel(GUILD_TEXT, 0, Some("general"), Some("g1"), Vec::new()),
        channel(DIRECT_ALICE, 1, None, None, vec![alice()]),
        channel(GROUP, 3, Some("friends"), None, vec![alice(), bob()]),
        channel(GUILD_VOICE, 2, Some("lounge"), Some("g1"), Vec::new()),
        channel(CATEGORY, 4, Some("Text Channels"), Some("g1"), Vec::new()),
        channel(UNKNOWN, 99, Some("mystery"), None, Vec::new()),
    ]
    .into_iter()
    .map(|c| (c.id.clone(), c))
    .collect()
}

/// Inbound message as the gateway would deliver it.
pub fn inbound(id: &str, channel_id: &str, author: NativeUser, content: &str) -> NativeMessage {
    NativeMessage {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        guild_id: None,
        author,
        content: content.to_string(),
        timestamp: Utc::now(),
        attachments: Vec::new(),
    }
}

pub fn attachment(filename: &str) -> NativeAttachment {
    NativeAttachment {
        id: format!("att-{filename}"),
        filename: filename.to_string(),
        url: format!("https://cdn.test/{filename}"),
    }
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Login,
    FetchChannel(String),
    CreateDm(String),
    GuildMembers(String),
    Send {
        channel_id: String,
        payload: OutgoingPayload,
    },
    Edit {
        channel_id: String,
        message_id: String,
        text: String,
    },
    Delete {
        channel_id: String,
        message_id: String,
    },
    StartTyping(String),
    StopTyping(String),
    Destroy,
}

pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    events: Mutex<Option<mpsc::UnboundedSender<GatewayEvent>>>,
    channels: Mutex<HashMap<String, NativeChannel>>,
    next_id: AtomicU64,
    pub fail_login: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_destroy: AtomicBool,
    pub fail_typing: AtomicBool,
    /// Login succeeds without the ready signal; tests send it with [`MockPlatform::ready`].
    pub hold_ready: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            channels: Mutex::new(seed_channels()),
            next_id: AtomicU64::new(1000),
            fail_login: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_destroy: AtomicBool::new(false),
            fail_typing: AtomicBool::new(false),
            hold_ready: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sends(&self) -> Vec<(String, OutgoingPayload)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send {
                    channel_id,
                    payload,
                } => Some((channel_id, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Pushes an inbound message to the subscriber.
    pub fn emit(&self, message: NativeMessage) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(GatewayEvent::MessageCreate(message));
        }
    }

    pub fn ready(&self) {
        self.push(GatewayEvent::Ready(me()));
    }

    /// Announces a dropped connection, as the gateway does before re-identifying.
    pub fn reconnect(&self) {
        self.push(GatewayEvent::Reconnecting);
    }

    /// Ends the event stream, as a gateway that gave up would.
    pub fn close_stream(&self) {
        self.events.lock().take();
    }

    fn push(&self, event: GatewayEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn fail(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(DbotError::Platform(format!("{what} rejected")))
        } else {
            Ok(())
        }
    }

    fn posted(&self, channel_id: &str, content: String, attachments: Vec<NativeAttachment>) -> NativeMessage {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        NativeMessage {
            id: id.to_string(),
            channel_id: channel_id.to_string(),
            guild_id: None,
            author: me(),
            content,
            timestamp: Utc::now(),
            attachments,
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<GatewayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        rx
    }

    async fn login(&self, _token: &str) -> Result<()> {
        self.record(Call::Login);
        Self::fail(&self.fail_login, "login")?;
        if !self.hold_ready.load(Ordering::SeqCst) {
            self.ready();
        }
        Ok(())
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<NativeChannel> {
        self.record(Call::FetchChannel(channel_id.to_string()));
        self.channels
            .lock()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| DbotError::Platform(format!("Unknown Channel {channel_id}")))
    }

    async fn create_dm(&self, user_id: &str) -> Result<NativeChannel> {
        self.record(Call::CreateDm(user_id.to_string()));
        let mut channels = self.channels.lock();
        if let Some(existing) = channels
            .values()
            .find(|c| c.kind == 1 && c.recipients.first().map(|u| u.id.as_str()) == Some(user_id))
        {
            return Ok(existing.clone());
        }
        let recipient = match user_id {
            "2" => alice(),
            "3" => bob(),
            other => NativeUser::new(other, format!("user{other}")),
        };
        let dm = channel(&format!("dm-{user_id}"), 1, None, None, vec![recipient]);
        channels.insert(dm.id.clone(), dm.clone());
        Ok(dm)
    }

    async fn guild_members(&self, guild_id: &str) -> Result<Vec<NativeUser>> {
        self.record(Call::GuildMembers(guild_id.to_string()));
        Ok(vec![me(), alice(), bob()])
    }

    async fn send(&self, channel_id: &str, payload: OutgoingPayload) -> Result<SentMessages> {
        self.record(Call::Send {
            channel_id: channel_id.to_string(),
            payload: payload.clone(),
        });
        Self::fail(&self.fail_send, "send")?;
        let attachments = payload
            .file
            .as_ref()
            .map(|file| vec![attachment(&file.name)])
            .unwrap_or_default();
        Ok(SentMessages::One(self.posted(channel_id, payload.content, attachments)))
    }

    async fn edit(&self, channel_id: &str, message_id: &str, text: &str) -> Result<NativeMessage> {
        self.record(Call::Edit {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
        });
        let mut edited = self.posted(channel_id, text.to_string(), Vec::new());
        edited.id = message_id.to_string();
        Ok(edited)
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.record(Call::Delete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Self::fail(&self.fail_delete, "delete")
    }

    async fn start_typing(&self, channel_id: &str) -> Result<()> {
        self.record(Call::StartTyping(channel_id.to_string()));
        Self::fail(&self.fail_typing, "typing")
    }

    async fn stop_typing(&self, channel_id: &str) -> Result<()> {
        self.record(Call::StopTyping(channel_id.to_string()));
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.record(Call::Destroy);
        self.events.lock().take();
        Self::fail(&self.fail_destroy, "destroy")
    }
}

/// Hands out a fresh [`MockPlatform`] per session and keeps every one it created.
#[derive(Default)]
pub struct MockFactory {
    created: Mutex<Vec<Arc<MockPlatform>>>,
    pub fail_login: AtomicBool,
    pub hold_ready: AtomicBool,
}

impl MockFactory {
    pub fn latest(&self) -> Arc<MockPlatform> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no platform created yet")
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }
}

impl PlatformFactory for MockFactory {
    fn create(&self, _config: &DiscordConfig) -> Result<Arc<dyn Platform>> {
        let platform = Arc::new(MockPlatform::new());
        platform
            .fail_login
            .store(self.fail_login.load(Ordering::SeqCst), Ordering::SeqCst);
        platform
            .hold_ready
            .store(self.hold_ready.load(Ordering::SeqCst), Ordering::SeqCst);
        self.created.lock().push(platform.clone());
        let platform: Arc<dyn Platform> = platform;
        Ok(platform)
    }
}
