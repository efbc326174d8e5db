//! Application session: which screen is showing and what lives with it.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    chat::{ChatEvent, ChatRoom, ChatStore},
    config::Config,
    discovery::{DiscoverySession, Scanner},
    error::{DiscoveryError, SessionError},
    peer::{Peer, PeerList, demo_peers},
    profile::{KeyValueStore, Profile, ProfileStore},
};

/// How long the splash screen stays up before `finish_splash` is due.
pub const SPLASH_DURATION: Duration = Duration::from_millis(2_500);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Splash,
    Permissions,
    ProfileSetup,
    Radar,
    Chat,
    Known,
    Moments,
}

/// Progress of a chat request sent to a peer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Requesting,
    Accepted,
    Declined,
}

pub struct Session<K: KeyValueStore, S: Scanner> {
    config: Config,
    profiles: ProfileStore<K>,
    profile: Option<Profile>,
    screen: Screen,
    discovery: DiscoverySession<S>,
    demo: PeerList,
    chat_store: Arc<dyn ChatStore>,
    chat: Option<ChatRoom>,
    /// Peer we asked to chat with, and how that is going
    request: Option<(Peer, ConnectionStatus)>,
}

impl<K: KeyValueStore, S: Scanner> Session<K, S> {
    /// Restore the saved profile and show the splash screen.
    pub async fn start(
        config: Config,
        store: K,
        scanner: S,
        chat_store: Arc<dyn ChatStore>,
    ) -> Result<Self, SessionError> {
        let profiles = ProfileStore::new(store, config.profile_key.clone());
        let profile = profiles.load().await?;
        info!(has_profile = profile.is_some(), "session started");
        Ok(Self {
            discovery: DiscoverySession::new(scanner, &config),
            config,
            profiles,
            profile,
            screen: Screen::Splash,
            demo: demo_peers(),
            chat_store,
            chat: None,
            request: None,
        })
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Peers to draw on the radar. Without a scanner this is the demo set.
    pub fn peers(&self) -> &PeerList {
        if self.discovery.is_available() {
            self.discovery.peers()
        } else {
            &self.demo
        }
    }

    pub fn chat(&self) -> Option<&ChatRoom> {
        self.chat.as_ref()
    }

    pub fn chat_request(&self) -> Option<&(Peer, ConnectionStatus)> {
        self.request.as_ref()
    }

    /// Leave the splash screen. A saved profile goes straight to the radar,
    /// otherwise onboarding starts with the permissions screen.
    pub fn finish_splash(&mut self) {
        if self.screen != Screen::Splash {
            return;
        }
        let next = if self.profile.is_some() {
            Screen::Radar
        } else {
            Screen::Permissions
        };
        self.navigate(next);
    }

    pub fn grant_permissions(&mut self) {
        self.navigate(Screen::ProfileSetup);
    }

    /// Save the user's identity and show the radar.
    pub async fn complete_onboarding(
        &mut self,
        username: &str,
        custom_avatar: Option<String>,
    ) -> Result<&Profile, SessionError> {
        let mut profile = Profile::new(username)?;
        if let Some(avatar) = custom_avatar {
            profile = profile.with_custom_avatar(avatar);
        }
        self.profiles.save(&profile).await?;
        self.navigate(Screen::Radar);
        Ok(self.profile.insert(profile))
    }

    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.profiles.clear().await?;
        self.profile = None;
        self.navigate(Screen::ProfileSetup);
        Ok(())
    }

    /// Switch screens, releasing whatever the previous one held.
    pub fn navigate(&mut self, screen: Screen) {
        if screen == self.screen {
            return;
        }
        match self.screen {
            Screen::Radar => {
                self.discovery.clear();
                self.request = None;
            }
            Screen::Chat => {
                if let Some(mut room) = self.chat.take() {
                    room.close();
                }
            }
            _ => {}
        }
        debug!(from = ?self.screen, to = ?screen, "navigate");
        self.screen = screen;
    }

    /// Scan for one more nearby device.
    pub async fn scan(&mut self) -> Result<Option<Peer>, DiscoveryError> {
        self.discovery.scan().await
    }

    /// Ask a peer on the radar for a private chat.
    pub fn request_chat(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let peer = self
            .peers()
            .get(peer_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownPeer(peer_id.to_string()))?;
        info!(peer = %peer, "chat requested");
        self.request = Some((peer, ConnectionStatus::Requesting));
        Ok(())
    }

    pub fn cancel_request(&mut self) {
        self.request = None;
    }

    /// Record the peer's answer. Accepting opens the chat room.
    pub async fn answer_request(
        &mut self,
        accepted: bool,
    ) -> Result<Option<mpsc::Receiver<ChatEvent>>, SessionError> {
        let (peer, status) = self.request.as_mut().ok_or(SessionError::NoRequest)?;
        if !accepted {
            *status = ConnectionStatus::Declined;
            return Ok(None);
        }
        *status = ConnectionStatus::Accepted;
        let name = peer.username.clone();
        self.open_chat(&name).await.map(Some)
    }

    /// Open the conversation with `other` and show it.
    pub async fn open_chat(&mut self, other: &str) -> Result<mpsc::Receiver<ChatEvent>, SessionError> {
        let me = self
            .profile
            .as_ref()
            .map(|p| p.username.clone())
            .ok_or(SessionError::NoProfile)?;
        let (room, events) = ChatRoom::open(
            self.chat_store.clone(),
            &me,
            other,
            self.config.chat_page_size,
        )
        .await?;
        self.navigate(Screen::Chat);
        self.chat = Some(room);
        Ok(events)
    }
}
