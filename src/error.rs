use thiserror::Error;

/// Failures while looking for a nearby device.
#[derive(Error, PartialEq, Debug)]
pub enum DiscoveryError {
    #[error(
        "Bluetooth scanning is not available. Use a modern browser (Chrome, Edge or Opera) \
         over a secure HTTPS connection, and make sure Bluetooth is enabled on your system."
    )]
    Unsupported,
    #[error("Could not access Bluetooth, check that it is enabled and permission was granted: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Failed to encode profile: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Username must not be empty.")]
    EmptyUsername,
}

#[derive(Error, PartialEq, Debug)]
pub enum ChatError {
    #[error("Message text must not be empty.")]
    EmptyMessage,
    #[error("Chat store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Store(format!("{err:#}"))
    }
}

#[derive(Error, PartialEq, Debug, Clone)]
pub enum VideoError {
    #[error("API key is not valid. Select a key from a project with active billing.")]
    InvalidApiKey,
    #[error("Invalid reference image: {0}")]
    InvalidImage(String),
    #[error("Video generation failed - no URI returned")]
    NoVideo,
    #[error("Video generation did not finish after {0} polls")]
    TimedOut(u32),
    #[error("Problem connecting to the video service: {0}")]
    Service(String),
}

impl VideoError {
    /// Classify a raw message reported by the remote service.
    pub fn from_service_message(message: &str) -> Self {
        if message.contains("Requested entity was not found") {
            VideoError::InvalidApiKey
        } else {
            VideoError::Service(message.to_string())
        }
    }
}

#[derive(Error, PartialEq, Debug, Clone)]
pub enum IntelError {
    #[error("Problem connecting to the intel service: {0}")]
    Service(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No profile set up yet.")]
    NoProfile,
    #[error("No peer {0} on the radar.")]
    UnknownPeer(String),
    #[error("No chat request pending.")]
    NoRequest,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}
