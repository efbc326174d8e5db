pub mod chat;
pub mod config;
mod docs;
pub mod discovery;
pub mod error;
pub mod intel;
mod node;
pub mod peer;
pub mod profile;
pub mod proximity;
pub mod radar;
pub mod session;
pub mod video;

pub use chat::{ChatEvent, ChatMessage, ChatRoom, ChatStore, DeliveryStatus, MemoryChatStore, RoomKey};
pub use config::Config;
pub use discovery::{Advertisement, DiscoverySession, ScanError, ScannedDevice, Scanner};
pub use docs::DocChatStore;
pub use intel::{Coordinates, IntelService, StationReport, station_report};
pub use node::IrohNode;
pub use peer::{Peer, PeerList, demo_peers};
pub use profile::{FileStore, KeyValueStore, MemoryStore, Profile, ProfileStore};
pub use proximity::ProximityModel;
pub use radar::{Placement, polar_placement};
pub use session::{ConnectionStatus, Screen, Session};
