//! Station intel: a short, search-grounded report about the area around the
//! user's stop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::IntelConfig, error::IntelError};

pub const INTEL_PROMPT: &str = "Actúa como 'Kiwia Intel'. Analiza mi paradero actual. Dime qué \
     lugares interesantes hay a menos de 10 min caminando (cafés, arte urbano, tiendas raras) y \
     dame un dato curioso o noticia reciente sobre esta zona. Responde en tono Gen-Z, vibrante y \
     muy conciso.";

/// Shown when the service answers without any text.
pub const NO_INTEL_TEXT: &str = "No se pudo obtener información del paradero.";
/// Shown when the service could not be reached.
pub const INTEL_FAILED_TEXT: &str =
    "Radar bloqueado. La señal es débil en este paradero, intenta en un momento.";

const MAPS_TITLE: &str = "Ver en Maps";
const WEB_TITLE: &str = "Saber más";
const LABEL_MAX_CHARS: usize = 18;
const LABEL_KEEP_CHARS: usize = 15;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Default for Coordinates {
    /// Santiago centre, used when the device gives no position.
    fn default() -> Self {
        Self {
            lat: -33.4372,
            lng: -70.6341,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntelRequest {
    pub model: String,
    pub prompt: String,
    pub location: Coordinates,
    /// Ask the model to ground its answer in web and maps search.
    pub search_grounding: bool,
}

/// The parts of a grounded generation response the report needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IntelResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GroundingChunk {
    #[serde(default)]
    pub maps: Option<GroundingSource>,
    #[serde(default)]
    pub web: Option<GroundingSource>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GroundingSource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IntelLink {
    pub title: String,
    pub uri: String,
}

impl IntelLink {
    /// Title shortened for a chip: long titles keep 15 characters and an ellipsis.
    pub fn label(&self) -> String {
        if self.title.chars().count() > LABEL_MAX_CHARS {
            let kept: String = self.title.chars().take(LABEL_KEEP_CHARS).collect();
            format!("{kept}...")
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationReport {
    pub text: String,
    pub links: Vec<IntelLink>,
}

/// Narrow view of the hosted model used for station intel.
#[async_trait]
pub trait IntelService: Send + Sync {
    async fn generate(&self, request: &IntelRequest) -> Result<IntelResponse, IntelError>;
}

/// Links from grounding chunks. A maps source wins over a web source in the
/// same chunk, and chunks without a link are skipped.
pub fn extract_links(chunks: &[GroundingChunk]) -> Vec<IntelLink> {
    chunks
        .iter()
        .filter_map(|chunk| {
            let (source, default_title) = match (&chunk.maps, &chunk.web) {
                (Some(maps), _) => (maps, MAPS_TITLE),
                (None, Some(web)) => (web, WEB_TITLE),
                (None, None) => return None,
            };
            let uri = source.uri.clone().filter(|uri| !uri.is_empty())?;
            let title = source
                .title
                .clone()
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| default_title.to_string());
            Some(IntelLink { title, uri })
        })
        .collect()
}

/// Ask for a report about `location`, or the default spot when it is unknown.
///
/// Never fails: service errors turn into the fixed fallback text with no links.
pub async fn station_report<S: IntelService + ?Sized>(
    service: &S,
    config: &IntelConfig,
    location: Option<Coordinates>,
) -> StationReport {
    let request = IntelRequest {
        model: config.model.clone(),
        prompt: INTEL_PROMPT.to_string(),
        location: location.unwrap_or(config.default_location),
        search_grounding: true,
    };
    info!(lat = request.location.lat, lng = request.location.lng, "requesting station intel");
    match service.generate(&request).await {
        Ok(response) => StationReport {
            text: response
                .text
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| NO_INTEL_TEXT.to_string()),
            links: extract_links(&response.grounding_chunks),
        },
        Err(e) => {
            warn!("station intel failed: {e}");
            StationReport {
                text: INTEL_FAILED_TEXT.to_string(),
                links: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_titles_are_shortened() {
        let link = |title: &str| IntelLink {
            title: title.to_string(),
            uri: "https://x".to_string(),
        };
        assert_eq!(link("Café Literario").label(), "Café Literario");
        assert_eq!(link("Exactly eighteen c").label(), "Exactly eighteen c");
        assert_eq!(link("Museo de Bellas Artes Santiago").label(), "Museo de Bellas...");
    }

    #[test]
    fn maps_source_wins_within_a_chunk() {
        let chunk = GroundingChunk {
            maps: Some(GroundingSource {
                title: None,
                uri: Some("https://maps/a".to_string()),
            }),
            web: Some(GroundingSource {
                title: Some("Web".to_string()),
                uri: Some("https://web/a".to_string()),
            }),
        };
        assert_eq!(
            extract_links(&[chunk]),
            [IntelLink {
                title: "Ver en Maps".to_string(),
                uri: "https://maps/a".to_string()
            }]
        );
    }
}
