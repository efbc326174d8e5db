use std::{fmt::Display, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::radar::{Placement, polar_placement};

/// Name prefix for devices that do not advertise a name.
pub const DEFAULT_NAME_PREFIX: &str = "Pasajero_";

/// Base URL of the generated identicons used for discovered devices.
const IDENTICON_URL: &str = "https://api.dicebear.com/7.x/identicon/svg?seed=";

/// A nearby device shown on the radar
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Peer {
    /// Unique per discovered hardware address
    pub id: String,
    pub username: String,
    /// Avatar URL
    pub avatar: String,
    /// Radar distance, 0-100
    pub distance: f64,
    /// Radar angle in degrees. Cosmetic only, the scanner reports no bearing.
    pub angle: f64,
}

impl Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}

impl Peer {
    /// Build a peer from what the scanner reported.
    pub fn discovered(id: &str, name: Option<&str>, distance: f64, angle: f64) -> Self {
        let username = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_username(id),
        };
        Self {
            id: id.to_string(),
            username,
            avatar: format!("{IDENTICON_URL}{id}"),
            distance,
            angle,
        }
    }

    pub fn placement(&self, scale: f64) -> Placement {
        polar_placement(self.distance, self.angle, scale)
    }

    /// Rough distance in metres as shown in the nearby list.
    pub fn approx_meters(&self) -> u32 {
        (self.distance / 2.0).round().max(0.0) as u32
    }

    /// Distance in metres as shown when asking this peer to chat.
    ///
    /// The request prompt uses a tighter scale than the nearby list.
    pub fn request_meters(&self) -> u32 {
        (self.distance / 10.0).round().max(0.0) as u32
    }
}

/// `Pasajero_` followed by the last four characters of the id.
pub fn default_username(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{DEFAULT_NAME_PREFIX}{tail}")
}

/// Peers found in the current radar session, newest first.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PeerList(Vec<Peer>);

impl Deref for PeerList {
    type Target = [Peer];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for PeerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for peer in self.0.iter() {
            let mut id = peer.id.clone();
            id.truncate(10);
            writeln!(f, "[{}...]: '{}' ({:.0})", id, peer, peer.distance)?;
        }
        Ok(())
    }
}

impl PeerList {
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|peer| peer.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Peer> {
        self.0.iter().find(|peer| peer.id == id)
    }

    /// Put a peer at the front of the list.
    ///
    /// Returns `false`, leaving the list untouched, if a peer with the same id
    /// is already present.
    pub fn insert(&mut self, peer: Peer) -> bool {
        if self.contains(&peer.id) {
            return false;
        }
        self.0.insert(0, peer);
        true
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Fixed peers shown when real scanning is unavailable.
pub fn demo_peers() -> PeerList {
    let seeds = [
        ("1", "Elena_V", "Elena", 60.0, 45.0),
        ("2", "Marcos.dev", "Marcos", 40.0, 160.0),
        ("3", "Sofia_Kiwi", "Sofia", 85.0, 280.0),
    ];
    let mut peers = PeerList::default();
    for (id, username, seed, distance, angle) in seeds.into_iter().rev() {
        peers.insert(Peer {
            id: id.to_string(),
            username: username.to_string(),
            avatar: format!("https://api.dicebear.com/7.x/avataaars/svg?seed={seed}"),
            distance,
            angle,
        });
    }
    peers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_devices_get_a_placeholder() {
        let peer = Peer::discovered("AB:CD:EF:12:34", None, 50.0, 10.0);
        assert_eq!(peer.username, "Pasajero_2:34");
        assert_eq!(
            peer.avatar,
            "https://api.dicebear.com/7.x/identicon/svg?seed=AB:CD:EF:12:34"
        );
        let blank = Peer::discovered("xyz", Some("  "), 50.0, 10.0);
        assert_eq!(blank.username, "Pasajero_xyz");
        let named = Peer::discovered("xyz", Some("Mateo"), 50.0, 10.0);
        assert_eq!(named.username, "Mateo");
    }

    #[test]
    fn newest_first_without_duplicates() {
        let mut peers = PeerList::default();
        assert!(peers.insert(Peer::discovered("a", Some("A"), 20.0, 0.0)));
        assert!(peers.insert(Peer::discovered("b", Some("B"), 30.0, 0.0)));
        assert!(!peers.insert(Peer::discovered("a", Some("A again"), 90.0, 0.0)));

        let ids: Vec<_> = peers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(peers.get("a").unwrap().username, "A");
    }

    #[test]
    fn demo_peers_keep_their_order() {
        let peers = demo_peers();
        let names: Vec<_> = peers.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, ["Elena_V", "Marcos.dev", "Sofia_Kiwi"]);
    }

    #[test]
    fn approx_meters_halves_distance() {
        assert_eq!(Peer::discovered("a", None, 61.0, 0.0).approx_meters(), 31);
    }

    #[test]
    fn request_meters_uses_tenths() {
        assert_eq!(Peer::discovered("a", None, 45.0, 0.0).request_meters(), 5);
        assert_eq!(Peer::discovered("a", None, 95.0, 0.0).request_meters(), 10);
        assert_eq!(Peer::discovered("a", None, 15.0, 0.0).request_meters(), 2);
    }
}
