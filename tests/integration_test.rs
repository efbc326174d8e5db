mod common;
use common::*;

use anyhow::Result;
use kiwia::{ChatEvent, ChatRoom, DeliveryStatus, DocChatStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Wait until a snapshot satisfies `check`, skipping intermediate ones.
async fn await_snapshot(
    events: &mut mpsc::Receiver<ChatEvent>,
    check: impl Fn(&ChatEvent) -> bool,
) -> Result<ChatEvent> {
    let duration = Duration::from_secs(20);
    tokio::time::timeout(duration, async {
        loop {
            let event = events
                .recv()
                .await
                .ok_or_else(|| anyhow::anyhow!("Event channel closed"))?;
            if check(&event) {
                return Ok::<_, anyhow::Error>(event);
            }
        }
    })
    .await?
}

#[tokio::test]
async fn test_chat_between_two_nodes() -> Result<()> {
    // --- SETUP PHASE ---
    let host_dir = tempfile::tempdir()?;
    let guest_dir = tempfile::tempdir()?;

    println!("Creating host store");
    let host_store = DocChatStore::create(host_dir.path().to_path_buf()).await?;
    let ticket = host_store.ticket().to_string();
    println!("Host ticket: {ticket}");

    println!("Joining from guest store");
    let guest_store = DocChatStore::join(guest_dir.path().to_path_buf(), &ticket).await?;
    assert_ne!(host_store.id(), guest_store.id());

    let (elena, mut elena_events) =
        ChatRoom::open(Arc::new(host_store.clone()), "Elena", "Mateo", 50).await?;
    let (mateo, mut mateo_events) =
        ChatRoom::open(Arc::new(guest_store.clone()), "Mateo", "Elena", 50).await?;
    assert_eq!(elena.key(), mateo.key());

    // --- MESSAGING PHASE ---
    println!("Sending from host");
    let sent = elena.send("¿Alguien sabe si el 402 viene retrasado?").await?;
    assert_eq!(sent.status, DeliveryStatus::Sent);

    let event = await_snapshot(&mut mateo_events, |e| !texts(e).is_empty()).await?;
    println!("Guest received: {event:?}");
    assert_eq!(texts(&event), ["¿Alguien sabe si el 402 viene retrasado?"]);

    println!("Replying from guest");
    mateo.send("Sí, unos 5 minutos").await?;
    let event = await_snapshot(&mut elena_events, |e| texts(e).len() == 2).await?;
    assert_eq!(
        texts(&event),
        ["¿Alguien sabe si el 402 viene retrasado?", "Sí, unos 5 minutos"]
    );

    // --- READ RECEIPT ---
    println!("Marking host message read");
    mateo.mark_read(&sent.id).await?;
    let event = await_snapshot(&mut elena_events, |e| {
        let ChatEvent::Messages(messages) = e;
        messages
            .iter()
            .any(|m| m.id == sent.id && m.status == DeliveryStatus::Read)
    })
    .await?;
    let ChatEvent::Messages(messages) = event;
    assert_eq!(messages.len(), 2);

    drop((elena, mateo));
    host_store.shutdown().await?;
    guest_store.shutdown().await?;
    Ok(())
}
