// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sign detection: image preparation, detector backends, catalogue lookup

pub mod labels;
pub mod ollama;
pub mod yolo;

use async_trait::async_trait;
use image::GenericImageView;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{DetectorBackend, DetectorConfig};
use crate::db::{Category, Database, Sign};
use crate::{RambuError, Result};
use labels::{LabelTable, SignLabel};

/// One box reported by a detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in prepared-image pixels, when the backend gives one
    pub bbox: Option<[f32; 4]>,
}

/// Decoded, downscaled and JPEG-encoded photo ready for a model
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for sign detector backends
#[async_trait]
pub trait SignDetector: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Fail if the model cannot be reached
    async fn health_check(&self) -> Result<()>;

    /// Run one forward pass over the image
    async fn detect(&self, image: &PreparedImage) -> Result<Vec<Detection>>;
}

/// Decode an upload and resize it so its longest side is at most `max_side`.
///
/// Anything the `image` crate cannot decode is a client error.
pub fn prepare_image(data: &[u8], max_side: u32) -> Result<PreparedImage> {
    let img = image::load_from_memory(data).map_err(|e| {
        debug!("Rejected upload that is not an image: {}", e);
        RambuError::BadRequest("File bukan gambar yang valid".to_string())
    })?;

    let img = if img.width() > max_side || img.height() > max_side {
        img.resize(max_side, max_side, image::imageops::FilterType::Triangle)
    } else {
        img
    };
    let (width, height) = img.dimensions();

    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)?;

    Ok(PreparedImage { jpeg, width, height })
}

/// Build the configured backend
pub fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn SignDetector>> {
    let detector: Arc<dyn SignDetector> = match config.backend {
        DetectorBackend::Yolo => Arc::new(yolo::YoloClient::new(config)?),
        DetectorBackend::Ollama => Arc::new(ollama::OllamaClient::new(config)?),
    };
    Ok(detector)
}

/// Read a detector reply; a body that does not parse counts as an unavailable detector
pub(crate) async fn decode_reply<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| RambuError::DetectorUnavailable(format!("reading detector response: {}", e)))?;
    parse_reply(&body)
}

fn parse_reply<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| RambuError::DetectorUnavailable(format!("invalid detector response: {}", e)))
}

/// Exponential backoff before retry `attempt` (1-based), saturating instead of overflowing
pub(crate) fn backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Process-wide detector, connected on first use.
///
/// A failed initialization leaves the handle empty so the next request
/// tries again.
pub struct DetectorHandle {
    config: DetectorConfig,
    cell: OnceCell<Arc<dyn SignDetector>>,
}

impl DetectorHandle {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Handle that already holds a detector (tests, offline tools)
    pub fn preloaded(config: DetectorConfig, detector: Arc<dyn SignDetector>) -> Self {
        Self {
            config,
            cell: OnceCell::new_with(Some(detector)),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Get the detector, connecting and health-checking it the first time
    pub async fn get(&self) -> Result<Arc<dyn SignDetector>> {
        self.cell
            .get_or_try_init(|| async {
                let detector = build_detector(&self.config)?;
                detector.health_check().await?;
                info!("Sign detector '{}' ready at {}", detector.name(), self.config.url);
                Ok::<_, RambuError>(detector)
            })
            .await
            .map(Arc::clone)
    }
}

/// How the detected label was matched to a catalogue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Catalogue name equals the label
    Exact,
    /// Catalogue name contains the label
    Name,
    /// Catalogue name contains one of the label's keywords
    Keyword,
}

/// Response body of the detection endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub detected: bool,
    pub class_id: Option<u32>,
    pub label: Option<String>,
    pub kategori: Option<Category>,
    pub confidence: Option<f32>,
    pub bbox: Option<[f32; 4]>,
    pub rambu: Option<Sign>,
    pub match_type: Option<MatchKind>,
    pub message: String,
}

impl DetectionOutcome {
    fn nothing() -> Self {
        Self {
            detected: false,
            class_id: None,
            label: None,
            kategori: None,
            confidence: None,
            bbox: None,
            rambu: None,
            match_type: None,
            message: "Tidak ada rambu yang terdeteksi".to_string(),
        }
    }
}

/// Highest-confidence detection of a known class at or above the threshold
pub fn best_detection(
    detections: &[Detection],
    min_confidence: f32,
) -> Option<(Detection, &'static SignLabel)> {
    detections
        .iter()
        .filter(|d| d.confidence >= min_confidence)
        .filter_map(|d| match LabelTable.get(d.class_id) {
            Some(label) => Some((*d, label)),
            None => {
                debug!("Ignoring unknown class {}", d.class_id);
                None
            }
        })
        .max_by(|(a, _), (b, _)| a.confidence.total_cmp(&b.confidence))
}

/// Find the catalogue entry for a label: exact name, then name substring,
/// then each keyword, longest first
pub fn lookup_sign(db: &Database, label: &SignLabel) -> Result<Option<(Sign, MatchKind)>> {
    if let Some(sign) = db.find_sign_by_name(label.name)? {
        return Ok(Some((sign, MatchKind::Exact)));
    }
    if let Some(sign) = db.search_signs(label.name, 1)?.into_iter().next() {
        return Ok(Some((sign, MatchKind::Name)));
    }
    let mut keywords = label.keywords.to_vec();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
    for keyword in keywords {
        if let Some(sign) = db.search_signs(keyword, 1)?.into_iter().next() {
            return Ok(Some((sign, MatchKind::Keyword)));
        }
    }
    Ok(None)
}

/// Run the detector on a prepared photo and cross-reference the catalogue
pub async fn recognize(
    db: &Database,
    detector: &dyn SignDetector,
    image: &PreparedImage,
    min_confidence: f32,
) -> Result<DetectionOutcome> {
    let detections = detector.detect(image).await?;
    debug!("{} returned {} detections", detector.name(), detections.len());

    let Some((detection, label)) = best_detection(&detections, min_confidence) else {
        return Ok(DetectionOutcome::nothing());
    };

    let matched = lookup_sign(db, label)?;
    let message = match &matched {
        Some((sign, _)) => format!("Rambu terdeteksi: {}", sign.nama),
        None => format!("Rambu terdeteksi ({}) tetapi belum ada di katalog", label.name),
    };
    info!(
        "Detected '{}' ({:.0}%), catalogue match: {:?}",
        label.name,
        detection.confidence * 100.0,
        matched.as_ref().map(|(s, kind)| (s.id, *kind))
    );

    let (rambu, match_type) = match matched {
        Some((sign, kind)) => (Some(sign), Some(kind)),
        None => (None, None),
    };

    Ok(DetectionOutcome {
        detected: true,
        class_id: Some(detection.class_id),
        label: Some(label.name.to_string()),
        kategori: Some(label.kategori),
        confidence: Some(detection.confidence),
        bbox: detection.bbox,
        rambu,
        match_type,
        message,
    })
}
