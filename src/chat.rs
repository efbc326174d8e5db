//! Two-party chat rooms over a real-time message store.

mod events;
mod memory;

use std::{fmt::Display, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::error::ChatError;

pub use events::{ChatEvent, ChatWindow};
pub use memory::MemoryChatStore;

/// Delivery progress of a message. Only ever moves forward.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
}

/// Identifies the conversation between two people.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(String);

impl RoomKey {
    /// The same key for `(a, b)` and `(b, a)`.
    ///
    /// Each name carries its byte length, so no two pairs share a key
    /// whatever characters the names contain.
    pub fn between(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}:{first}_{}:{second}", first.len(), second.len()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    pub status: DeliveryStatus,
}

impl ChatMessage {
    pub fn new(sender: &str, text: &str) -> Result<Self> {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_millis() as u64;
        Ok(Self {
            id: format!("{created_at:x}-{:08x}", rand::random::<u32>()),
            sender: sender.to_string(),
            text: text.to_string(),
            created_at,
            status: DeliveryStatus::Pending,
        })
    }
}

/// Hosted store holding the messages of every room.
///
/// Subscriptions first replay the newest `limit` messages of the room, then
/// forward every later write, including status changes, as the full message.
#[async_trait]
pub trait ChatStore: Send + Sync + 'static {
    /// Persist a message and return it as stored.
    async fn append(&self, room: &RoomKey, message: ChatMessage) -> Result<ChatMessage>;

    async fn set_status(&self, room: &RoomKey, id: &str, status: DeliveryStatus) -> Result<()>;

    async fn subscribe(
        &self,
        room: &RoomKey,
        limit: usize,
    ) -> Result<mpsc::UnboundedReceiver<ChatMessage>>;
}

/// An open conversation with one other person.
///
/// Dropping the room stops the subscription.
pub struct ChatRoom {
    store: Arc<dyn ChatStore>,
    key: RoomKey,
    me: String,
    /// Subscription loop handle
    event_handle: Option<JoinHandle<()>>,
}

impl Drop for ChatRoom {
    fn drop(&mut self) {
        if let Some(handle) = self.event_handle.take() {
            handle.abort();
        }
    }
}

impl ChatRoom {
    /// Open the room between `me` and `other` and start listening.
    pub async fn open(
        store: Arc<dyn ChatStore>,
        me: &str,
        other: &str,
        limit: usize,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>), ChatError> {
        let key = RoomKey::between(me, other);
        let updates = store.subscribe(&key, limit).await?;
        let (event_inbox, event_handle) = events::start_event_loop(updates, limit);
        debug!(room = %key, "chat room opened");
        let room = Self {
            store,
            key,
            me: me.to_string(),
            event_handle: Some(event_handle),
        };
        Ok((room, event_inbox))
    }

    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    pub fn is_open(&self) -> bool {
        self.event_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Send a chat message.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let message = ChatMessage::new(&self.me, text)?;
        Ok(self.store.append(&self.key, message).await?)
    }

    /// Mark someone else's message as read.
    pub async fn mark_read(&self, id: &str) -> Result<(), ChatError> {
        Ok(self
            .store
            .set_status(&self.key, id, DeliveryStatus::Read)
            .await?)
    }

    /// Stop listening for updates.
    pub fn close(&mut self) {
        if let Some(handle) = self.event_handle.take() {
            handle.abort();
            debug!(room = %self.key, "chat room closed");
        }
    }
}
