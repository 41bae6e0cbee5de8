//! Identity cache: one wrapper per native id for the lifetime of a session.
//!
//! Lookups are get-or-insert. An existing entry always wins over a newer native snapshot, so every
//! holder of a wrapper sees the same object. Entries are only dropped all at once by
//! [`IdentityCache::clear`] when the session ends.

use std::sync::Arc;

use dashmap::DashMap;
use dbot_core::{Channel, User};

use crate::kind::ChannelKind;
use crate::wrapped::{DiscordChannel, DiscordClientUser, DiscordUser};

/// Keyed storage behind the cache.
pub trait KeyedStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    /// Returns the stored value, or stores and returns `make()` if the key is absent.
    fn get_or_insert_with(&self, key: &str, make: Box<dyn FnOnce() -> V + Send + '_>) -> V;
    fn values(&self) -> Vec<V>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&self);
}

/// In-memory [`KeyedStore`]; get-or-insert is atomic per key.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> KeyedStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn get_or_insert_with(&self, key: &str, make: Box<dyn FnOnce() -> V + Send + '_>) -> V {
        self.entries
            .entry(key.to_string())
            .or_insert_with(make)
            .value()
            .clone()
    }

    fn values(&self) -> Vec<V> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

pub struct IdentityCache {
    self_user: Arc<DiscordClientUser>,
    users: Box<dyn KeyedStore<Arc<DiscordUser>>>,
    channels: Box<dyn KeyedStore<Arc<DiscordChannel>>>,
}

impl IdentityCache {
    pub fn new(self_user: Arc<DiscordClientUser>) -> Self {
        Self::with_stores(
            self_user,
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
        )
    }

    pub fn with_stores(
        self_user: Arc<DiscordClientUser>,
        users: Box<dyn KeyedStore<Arc<DiscordUser>>>,
        channels: Box<dyn KeyedStore<Arc<DiscordChannel>>>,
    ) -> Self {
        Self {
            self_user,
            users,
            channels,
        }
    }

    pub fn self_user(&self) -> &Arc<DiscordClientUser> {
        &self.self_user
    }

    pub fn is_self(&self, id: &str) -> bool {
        self.self_user.identity_id() == id
    }

    /// Resolves a user id. The session's own id yields the self user; any other id yields the
    /// cached wrapper, building it with `make` on first sighting.
    pub fn resolve_user<F>(&self, id: &str, make: F) -> Arc<dyn User>
    where
        F: FnOnce() -> DiscordUser + Send,
    {
        if self.is_self(id) {
            return self.self_user.clone();
        }
        let user: Arc<DiscordUser> = self
            .users
            .get_or_insert_with(id, Box::new(move || Arc::new(make())));
        user
    }

    pub fn resolve_channel<F>(&self, id: &str, make: F) -> Arc<DiscordChannel>
    where
        F: FnOnce() -> DiscordChannel + Send,
    {
        self.channels
            .get_or_insert_with(id, Box::new(move || Arc::new(make())))
    }

    pub fn user(&self, id: &str) -> Option<Arc<DiscordUser>> {
        self.users.get(id)
    }

    pub fn channel(&self, id: &str) -> Option<Arc<DiscordChannel>> {
        self.channels.get(id)
    }

    pub fn channels(&self) -> Vec<Arc<DiscordChannel>> {
        self.channels.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Cached direct conversation with `user_id`, if one has been seen.
    pub fn direct_channel_with(&self, user_id: &str) -> Option<Arc<DiscordChannel>> {
        self.channels.values().into_iter().find(|channel| {
            channel.kind() == ChannelKind::Direct && channel.recipient_id() == Some(user_id)
        })
    }

    /// Returns the cached `Arc` only if it is this very object. A wrapper with the same id from
    /// another session (or a stale one from before `clear`) is rejected.
    pub fn owned_channel(&self, channel: &DiscordChannel) -> Option<Arc<DiscordChannel>> {
        let cached = self.channels.get(channel.identity_id())?;
        std::ptr::eq(Arc::as_ptr(&cached), channel).then_some(cached)
    }

    pub fn owned_user(&self, user: &DiscordUser) -> Option<Arc<DiscordUser>> {
        let cached = self.users.get(user.identity_id())?;
        std::ptr::eq(Arc::as_ptr(&cached), user).then_some(cached)
    }

    pub fn clear(&self) {
        self.users.clear();
        self.channels.clear();
    }
}
