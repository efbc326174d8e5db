//! Chat store backed by a shared iroh document.
//!
//! Every message is one entry keyed `chat.<len>:<room>.<created_at>.<id>`,
//! so a prefix query returns a room's messages in creation order. The room
//! length keeps one room's prefix from matching another room whose key
//! extends it. Status changes overwrite the same key.

use std::{collections::HashMap, path::PathBuf, pin::pin, str::FromStr as _};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use iroh::EndpointId;
use iroh_blobs::Hash;
use iroh_docs::{
    AuthorId, ContentStatus, DocTicket,
    api::{Doc, protocol::ShareMode},
    engine::LiveEvent,
    store::Query,
    sync::Entry,
};
use n0_future::{Stream, StreamExt as _};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    chat::{ChatMessage, ChatStore, DeliveryStatus, RoomKey},
    node::IrohNode,
};

const PREFIX_CHAT: &str = "chat.";

fn room_prefix(room: &RoomKey) -> String {
    let room = room.as_str();
    format!("{PREFIX_CHAT}{}:{room}.", room.len())
}

fn message_key(room: &RoomKey, message: &ChatMessage) -> String {
    // zero padded so keys sort by creation time
    format!("{}{:020}.{}", room_prefix(room), message.created_at, message.id)
}

/// Chat store shared with other nodes through a document ticket.
#[derive(Clone)]
pub struct DocChatStore {
    node: IrohNode,
    doc: Doc,
    author_id: AuthorId,
    ticket: DocTicket,
}

impl DocChatStore {
    /// Create a fresh document to chat in.
    pub async fn create(path: PathBuf) -> Result<Self> {
        let node = IrohNode::spawn(path).await?;
        let doc = node.docs().create().await?;
        let author_id = node.author_for(&doc.id()).await?;
        let ticket = doc.share(ShareMode::Write, Default::default()).await?;
        Ok(Self {
            node,
            doc,
            author_id,
            ticket,
        })
    }

    /// Join the document behind someone else's ticket.
    pub async fn join(path: PathBuf, ticket: &str) -> Result<Self> {
        let node = IrohNode::spawn(path).await?;
        let ticket = DocTicket::from_str(ticket)?;
        let doc = node.docs().import(ticket.clone()).await?;
        let author_id = node.author_for(&doc.id()).await?;
        Ok(Self {
            node,
            doc,
            author_id,
            ticket,
        })
    }

    pub fn id(&self) -> EndpointId {
        self.node.endpoint().id()
    }

    pub fn ticket(&self) -> &DocTicket {
        &self.ticket
    }

    pub async fn shutdown(self) -> Result<()> {
        self.node.shutdown().await
    }

    async fn write(&self, room: &RoomKey, message: &ChatMessage) -> Result<()> {
        let key = message_key(room, message);
        let value = postcard::to_stdvec(message)?;
        self.doc
            .set_bytes(self.author_id, key.into_bytes(), value)
            .await?;
        Ok(())
    }

    /// Every message currently stored for a room, oldest first.
    async fn room_messages(&self, room: &RoomKey) -> Result<Vec<ChatMessage>> {
        let prefix = room_prefix(room);
        let query = self
            .doc
            .get_many(Query::single_latest_per_key().key_prefix(prefix.as_bytes()));
        let mut entries = Box::pin(query.await?);
        let mut messages = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            match self.node.read_entry::<ChatMessage>(&entry).await {
                Ok(message) => messages.push(message),
                Err(e) => warn!("skipping unreadable chat entry: {e}"),
            }
        }
        messages.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(messages)
    }
}

#[async_trait]
impl ChatStore for DocChatStore {
    async fn append(&self, room: &RoomKey, mut message: ChatMessage) -> Result<ChatMessage> {
        message.status = message.status.max(DeliveryStatus::Sent);
        self.write(room, &message).await?;
        Ok(message)
    }

    async fn set_status(&self, room: &RoomKey, id: &str, status: DeliveryStatus) -> Result<()> {
        let mut message = self
            .room_messages(room)
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow!("no message {id} in {room}"))?;
        if status <= message.status {
            return Ok(());
        }
        message.status = status;
        self.write(room, &message).await
    }

    async fn subscribe(
        &self,
        room: &RoomKey,
        limit: usize,
    ) -> Result<mpsc::UnboundedReceiver<ChatMessage>> {
        // Subscribe before the replay so nothing written in between is lost.
        let sub = self.doc.subscribe().await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let recent = self.room_messages(room).await?;
        let skip = recent.len().saturating_sub(limit);
        for message in recent.into_iter().skip(skip) {
            sender.send(message)?;
        }

        let node = self.node.clone();
        let prefix = room_prefix(room);
        let room = room.clone();
        let mut pending_entries: HashMap<Hash, Entry> = HashMap::new();
        tokio::spawn(async move {
            forward_until_closed(sub, sender, move |event| {
                let entry = match event {
                    Ok(event) => parse_live_event(event, &mut pending_entries)
                        .filter(|entry| entry.key().starts_with(prefix.as_bytes())),
                    Err(e) => {
                        warn!("document subscription error: {e}");
                        None
                    }
                };
                let node = node.clone();
                async move {
                    match node.read_entry::<ChatMessage>(&entry?).await {
                        Ok(message) => Some(message),
                        Err(e) => {
                            warn!("failed to parse chat entry: {e}");
                            None
                        }
                    }
                }
            })
            .await;
            debug!(%room, "document subscription ended");
        });
        Ok(receiver)
    }
}

/// Pass decoded events on until the stream ends or the receiver goes away.
///
/// Waits on the receiver as well as the stream, so a closed room stops the
/// task even when no further entries arrive for it.
async fn forward_until_closed<E, T, F, Fut>(
    events: impl Stream<Item = E>,
    sender: mpsc::UnboundedSender<T>,
    mut decode: F,
) where
    F: FnMut(E) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut events = pin!(events);
    loop {
        let event = tokio::select! {
            _ = sender.closed() => break, // Subscriber gone
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if let Some(item) = decode(event).await {
            if sender.send(item).is_err() {
                break;
            }
        }
    }
}

/// Output a doc entry once its content is available locally.
fn parse_live_event(event: LiveEvent, pending_entries: &mut HashMap<Hash, Entry>) -> Option<Entry> {
    use ContentStatus::{Complete, Incomplete, Missing};
    match event {
        LiveEvent::InsertLocal { entry } => Some(entry),
        LiveEvent::InsertRemote {
            entry,
            content_status: Complete,
            ..
        } => Some(entry),
        LiveEvent::InsertRemote {
            entry,
            content_status: Missing | Incomplete,
            ..
        } => {
            pending_entries.insert(entry.content_hash(), entry);
            None
        }
        LiveEvent::ContentReady { hash } => pending_entries.remove(&hash),
        _other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_creation_time() {
        let room = RoomKey::between("Elena", "Mateo");
        let mut early = ChatMessage::new("Elena", "a").unwrap();
        early.created_at = 9;
        let mut late = early.clone();
        late.created_at = 10;
        let (early, late) = (message_key(&room, &early), message_key(&room, &late));
        assert!(early < late);
        assert!(early.starts_with(&room_prefix(&room)));
        assert!(early.starts_with("chat.15:5:Elena_5:Mateo."));
    }

    #[test]
    fn rooms_sharing_a_name_prefix_stay_apart() {
        let short = RoomKey::between("Elena", "Marcos");
        let long = RoomKey::between("Elena", "Marcos.dev");
        let message = ChatMessage::new("Elena", "hola").unwrap();
        let key = message_key(&long, &message);
        assert!(!key.starts_with(&room_prefix(&short)));
        assert!(key.starts_with(&room_prefix(&long)));
        assert!(!message_key(&short, &message).starts_with(&room_prefix(&long)));
    }

    #[tokio::test]
    async fn forwarding_stops_once_the_receiver_is_gone() {
        let (sender, receiver) = mpsc::unbounded_channel::<u32>();
        let task = tokio::spawn(forward_until_closed(
            futures::stream::pending::<u32>(),
            sender,
            |n| async move { Some(n) },
        ));
        drop(receiver);
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("forwarding task should end")
            .unwrap();
    }

    #[tokio::test]
    async fn forwarding_skips_undecodable_events() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let events = futures::stream::iter([1u32, 2, 3, 4]);
        forward_until_closed(events, sender, |n| async move { (n % 2 == 0).then_some(n) }).await;
        assert_eq!(receiver.recv().await, Some(2));
        assert_eq!(receiver.recv().await, Some(4));
        assert_eq!(receiver.recv().await, None);
    }
}
