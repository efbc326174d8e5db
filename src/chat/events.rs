use tokio::{sync::mpsc, task::JoinHandle};
use tracing::trace;

use super::ChatMessage;

/// Events the chat view receives
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The visible messages, oldest first.
    Messages(Vec<ChatMessage>),
}

/// Newest `limit` messages of a room, ordered by creation time then id.
#[derive(Debug, Clone)]
pub struct ChatWindow {
    messages: Vec<ChatMessage>,
    limit: usize,
}

impl ChatWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Merge one message into the window. Returns whether anything changed.
    ///
    /// A message already present only has its status advanced; a status that
    /// would move backwards is ignored.
    pub fn upsert(&mut self, message: ChatMessage) -> bool {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            if message.status > existing.status {
                existing.status = message.status;
                return true;
            }
            return false;
        }

        let position = self
            .messages
            .partition_point(|m| (m.created_at, m.id.as_str()) < (message.created_at, message.id.as_str()));
        if self.messages.len() >= self.limit && position == 0 {
            // older than everything in a full window
            return false;
        }
        self.messages.insert(position, message);
        if self.messages.len() > self.limit {
            let excess = self.messages.len() - self.limit;
            self.messages.drain(..excess);
        }
        true
    }
}

/// Forward store updates to the view as ordered snapshots.
pub(super) fn start_event_loop(
    mut updates: mpsc::UnboundedReceiver<ChatMessage>,
    limit: usize,
) -> (mpsc::Receiver<ChatEvent>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(32); // Event channel for the UI
    let mut window = ChatWindow::new(limit);

    let task_handle = tokio::spawn(async move {
        while let Some(message) = updates.recv().await {
            trace!(id = %message.id, "chat update");
            if !window.upsert(message) {
                continue;
            }
            // Drain whatever else is already queued so a replay yields one snapshot.
            while let Ok(message) = updates.try_recv() {
                window.upsert(message);
            }
            let event = ChatEvent::Messages(window.messages().to_vec());
            if sender.send(event).await.is_err() {
                break; // Channel closed
            }
        }
    });
    (receiver, task_handle)
}
