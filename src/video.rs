//! Promotional video generation through a hosted model.

mod job;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{config::VideoConfig, error::VideoError};

pub use job::{GeneratedVideo, JobState, VideoJob};

const DEFAULT_IMAGE_TYPE: &str = "image/png";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

/// Image the generated video should start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ReferenceImage {
    /// Parse a `data:<type>;base64,<payload>` URI.
    ///
    /// The content type falls back to `image/png` when the header has none.
    pub fn from_data_uri(uri: &str) -> Result<Self, VideoError> {
        let (header, payload) = uri
            .split_once(',')
            .ok_or_else(|| VideoError::InvalidImage("missing data separator".to_string()))?;
        let mime_type = header
            .split_once(':')
            .and_then(|(_, rest)| rest.split_once(';'))
            .map(|(mime, _)| mime)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
            .to_string();
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| VideoError::InvalidImage(e.to_string()))?;
        Ok(Self { bytes, mime_type })
    }

    /// Payload as the service expects it inline.
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Everything the service needs to start a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<ReferenceImage>,
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
    pub number_of_videos: u8,
}

impl VideoRequest {
    pub fn new(config: &VideoConfig, prompt: &str, aspect_ratio: AspectRatio) -> Self {
        Self {
            model: config.model.clone(),
            prompt: prompt.to_string(),
            image: None,
            aspect_ratio,
            resolution: config.resolution.clone(),
            number_of_videos: 1,
        }
    }

    pub fn with_image(mut self, image: ReferenceImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Handle on a long-running generation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    /// Media link of the first generated video, once done
    pub video_uri: Option<String>,
}

/// Narrow view of the hosted generation API.
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn submit(&self, request: &VideoRequest) -> Result<Operation, VideoError>;

    /// Fetch the latest state of an operation.
    async fn poll(&self, operation: &Operation) -> Result<Operation, VideoError>;

    /// Download the finished video.
    async fn fetch(&self, url: &str) -> Result<Bytes, VideoError>;
}

#[async_trait]
impl<T: VideoService + ?Sized> VideoService for Arc<T> {
    async fn submit(&self, request: &VideoRequest) -> Result<Operation, VideoError> {
        (**self).submit(request).await
    }

    async fn poll(&self, operation: &Operation) -> Result<Operation, VideoError> {
        (**self).poll(operation).await
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, VideoError> {
        (**self).fetch(url).await
    }
}

/// Source of delays between polls.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real time
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Media links need the API key before they can be fetched.
pub fn download_url(uri: &str, api_key: Option<&str>) -> String {
    match api_key {
        Some(key) if !key.is_empty() => {
            let separator = if uri.contains('?') { '&' } else { '?' };
            format!("{uri}{separator}key={key}")
        }
        _ => uri.to_string(),
    }
}

/// A ready-made prompt offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const PRESETS: [VideoPreset; 3] = [
    VideoPreset {
        id: "manifesto",
        label: "Brand Manifesto",
        prompt: "A premium, high-end cinematic advertisement for Kiwia app. The scene shows a \
                 modern, neon-lit bus stop at night. Diverse people are looking at their phones, \
                 and glowing lime-green digital threads of light emerge from their devices, \
                 weaving through the air to connect them. A translucent kiwi fruit hologram \
                 pulses in the center. Sleek motion graphics, professional color grading with \
                 deep blacks and vibrant lime accents, 4k detail, bokeh background.",
    },
    VideoPreset {
        id: "moments",
        label: "AI Moments",
        prompt: "A stylized transition from a real-life bus stop photo into a vibrant, \
                 AI-generated dreamscape. Swirling particles of light, cinematic camera \
                 movement, professional cinematography, theme of social connectivity and \
                 digital art.",
    },
    VideoPreset {
        id: "cyber",
        label: "Cyberpunk",
        prompt: "Futuristic bus stop in a rainy Tokyo-style street. Neon signs reflecting in \
                 puddles, cinematic lighting, purple and lime green color palette, high-tech \
                 interface overlays.",
    },
];

pub fn preset(id: &str) -> Option<&'static VideoPreset> {
    PRESETS.iter().find(|preset| preset.id == id)
}
