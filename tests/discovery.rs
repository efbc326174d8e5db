mod common;

use common::*;
use kiwia::{Config, DiscoverySession, error::DiscoveryError};
use rand::{SeedableRng, rngs::StdRng};

fn session(picks: Vec<Pick>) -> DiscoverySession<FakeScanner> {
    DiscoverySession::new(FakeScanner::new(picks), &Config::default())
}

#[tokio::test]
async fn signal_reading_sets_distance() -> anyhow::Result<()> {
    let mut session = session(vec![Pick::Device {
        id: "AA:BB:CC:DD",
        name: Some("Elena"),
        rssi: Some(Some(-90)),
    }]);
    let mut rng = StdRng::seed_from_u64(1);

    let peer = session.scan_with_rng(&mut rng).await?.expect("a peer");
    assert_eq!(peer.username, "Elena");
    assert_eq!(peer.distance, 95.0);
    assert!((0.0..360.0).contains(&peer.angle));
    assert_eq!(session.peers().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_device_falls_back_after_timeout() -> anyhow::Result<()> {
    let mut session = session(vec![Pick::Device {
        id: "0011",
        name: None,
        rssi: Some(None),
    }]);
    let started = tokio::time::Instant::now();

    let peer = session.scan().await?.expect("a peer");
    assert!(started.elapsed() >= std::time::Duration::from_millis(2_000));
    assert_eq!(peer.username, "Pasajero_0011");
    assert!((30.0..=80.0).contains(&peer.distance), "got {}", peer.distance);
    Ok(())
}

#[tokio::test]
async fn device_without_advertisements_still_shows_up() -> anyhow::Result<()> {
    let mut session = session(vec![Pick::Device {
        id: "beef",
        name: None,
        rssi: None,
    }]);
    let peer = session.scan().await?.expect("a peer");
    assert!((30.0..=80.0).contains(&peer.distance));
    Ok(())
}

#[tokio::test]
async fn same_device_twice_is_listed_once() -> anyhow::Result<()> {
    let device = || Pick::Device {
        id: "AA:BB",
        name: Some("Marcos"),
        rssi: Some(Some(-70)),
    };
    let mut session = session(vec![
        device(),
        Pick::Device {
            id: "CC:DD",
            name: Some("Sofia"),
            rssi: Some(Some(-60)),
        },
        device(),
    ]);
    for _ in 0..3 {
        session.scan().await?;
    }
    let ids: Vec<_> = session.peers().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["CC:DD", "AA:BB"]);
    Ok(())
}

#[tokio::test]
async fn cancelled_chooser_is_not_an_error() -> anyhow::Result<()> {
    let mut session = session(vec![Pick::Cancel]);
    assert_eq!(session.scan().await?, None);
    assert!(session.peers().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_scanner_is_reported() {
    let mut session = DiscoverySession::new(FakeScanner::unavailable(), &Config::default());
    let err = session.scan().await.unwrap_err();
    assert_eq!(err, DiscoveryError::Unsupported);
    assert!(err.to_string().contains("HTTPS"));
}

#[tokio::test]
async fn scanner_failures_surface() {
    let mut session = session(vec![Pick::Fail("adapter off")]);
    assert_eq!(
        session.scan().await,
        Err(DiscoveryError::Failed("adapter off".to_string()))
    );
}
