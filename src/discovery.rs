//! Discovery of nearby devices through a permission-gated scanner.

use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::DiscoveryError,
    peer::{Peer, PeerList},
    proximity::{ProximityModel, random_between},
};

/// Range of the distance used when no signal reading arrives.
const NO_READING_MIN: f64 = 30.0;
const NO_READING_MAX: f64 = 80.0;

/// One advertisement packet received from a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advertisement {
    /// Signal strength in dBm
    pub rssi: i32,
}

/// Device picked by the user in the scanner's chooser.
#[derive(Debug)]
pub struct ScannedDevice {
    pub id: String,
    pub name: Option<String>,
    /// Advertisement stream, when the platform lets us watch it.
    pub advertisements: Option<mpsc::Receiver<Advertisement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The user dismissed the chooser.
    Cancelled,
    Failed(String),
}

/// Platform access to the Bluetooth chooser.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Whether scanning exists at all in this runtime.
    fn is_available(&self) -> bool;

    /// Ask the user to pick a device. May wait indefinitely on the user.
    async fn request_device(&self) -> Result<ScannedDevice, ScanError>;
}

/// Radar session: scans on demand and collects what it finds.
pub struct DiscoverySession<S: Scanner> {
    scanner: S,
    model: ProximityModel,
    timeout: Duration,
    peers: PeerList,
}

impl<S: Scanner> DiscoverySession<S> {
    pub fn new(scanner: S, config: &Config) -> Self {
        Self {
            scanner,
            model: ProximityModel::new(config.proximity.clone()),
            timeout: config.scan_timeout(),
            peers: PeerList::default(),
        }
    }

    pub fn peers(&self) -> &PeerList {
        &self.peers
    }

    pub fn is_available(&self) -> bool {
        self.scanner.is_available()
    }

    /// Forget everything found so far.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Run one scan.
    ///
    /// Returns `Ok(None)` if the user cancelled the chooser. A device already
    /// in the session is returned again but not re-added.
    pub async fn scan(&mut self) -> Result<Option<Peer>, DiscoveryError> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.scan_with_rng(&mut rng).await
    }

    pub async fn scan_with_rng<R: Rng + Send>(
        &mut self,
        rng: &mut R,
    ) -> Result<Option<Peer>, DiscoveryError> {
        if !self.scanner.is_available() {
            warn!("bluetooth scanning unavailable in this runtime");
            return Err(DiscoveryError::Unsupported);
        }

        info!("requesting bluetooth device");
        let device = match self.scanner.request_device().await {
            Ok(device) => device,
            Err(ScanError::Cancelled) => {
                info!("device search cancelled by the user");
                return Ok(None);
            }
            Err(ScanError::Failed(reason)) => return Err(DiscoveryError::Failed(reason)),
        };
        debug!(id = %device.id, name = ?device.name, "device selected");

        let distance = match device.advertisements {
            Some(adverts) => match first_reading(adverts, self.timeout).await {
                Some(rssi) => {
                    let distance = self.model.display_distance_dbm(rssi, rng);
                    debug!(rssi, distance, "radar distance from signal");
                    distance
                }
                None => random_between(rng, NO_READING_MIN, NO_READING_MAX),
            },
            None => random_between(rng, NO_READING_MIN, NO_READING_MAX),
        };
        let angle = rng.random_range(0.0..360.0);

        let peer = Peer::discovered(&device.id, device.name.as_deref(), distance, angle);
        if !self.peers.insert(peer.clone()) {
            debug!(id = %peer.id, "device already on the radar");
        }
        Ok(Some(peer))
    }
}

/// Wait for the first advertisement, giving up after `timeout`.
async fn first_reading(mut adverts: mpsc::Receiver<Advertisement>, timeout: Duration) -> Option<i32> {
    match tokio::time::timeout(timeout, adverts.recv()).await {
        Ok(Some(advert)) => {
            debug!(rssi = advert.rssi, "advertisement received");
            Some(advert.rssi)
        }
        Ok(None) => None,
        Err(_) => {
            debug!(?timeout, "no advertisement before timeout");
            None
        }
    }
}
