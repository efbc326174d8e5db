use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChatMessage, ChatStore, DeliveryStatus, RoomKey};

#[derive(Default)]
struct RoomLog {
    messages: Vec<ChatMessage>,
    subscribers: Vec<mpsc::UnboundedSender<ChatMessage>>,
}

impl RoomLog {
    fn publish(&mut self, message: &ChatMessage) {
        self.subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
    }
}

/// Chat store kept in process memory, for demos and tests.
#[derive(Default)]
pub struct MemoryChatStore {
    rooms: Mutex<HashMap<RoomKey, RoomLog>>,
    offline: AtomicBool,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail, as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Stored messages of a room in write order.
    pub fn messages(&self, room: &RoomKey) -> Vec<ChatMessage> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(room).map(|log| log.messages.clone()))
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("chat store unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, room: &RoomKey, mut message: ChatMessage) -> Result<ChatMessage> {
        self.check_online()?;
        message.status = message.status.max(DeliveryStatus::Sent);
        let mut rooms = self.rooms.lock().map_err(|_| anyhow!("chat store lock poisoned"))?;
        let log = rooms.entry(room.clone()).or_default();
        log.messages.push(message.clone());
        log.publish(&message);
        Ok(message)
    }

    async fn set_status(&self, room: &RoomKey, id: &str, status: DeliveryStatus) -> Result<()> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().map_err(|_| anyhow!("chat store lock poisoned"))?;
        let log = rooms
            .get_mut(room)
            .ok_or_else(|| anyhow!("no room {room}"))?;
        let message = log
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow!("no message {id} in {room}"))?;
        if status <= message.status {
            return Ok(());
        }
        message.status = status;
        let message = message.clone();
        log.publish(&message);
        Ok(())
    }

    async fn subscribe(
        &self,
        room: &RoomKey,
        limit: usize,
    ) -> Result<mpsc::UnboundedReceiver<ChatMessage>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut rooms = self.rooms.lock().map_err(|_| anyhow!("chat store lock poisoned"))?;
        let log = rooms.entry(room.clone()).or_default();

        let mut recent = log.messages.clone();
        recent.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        let skip = recent.len().saturating_sub(limit);
        for message in recent.into_iter().skip(skip) {
            sender.send(message)?;
        }
        log.subscribers.push(sender);
        Ok(receiver)
    }
}
