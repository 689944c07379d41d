// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for an HTTP inference server hosting the pretrained sign detector

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{backoff, decode_reply, Detection, PreparedImage, SignDetector};
use crate::config::DetectorConfig;
use crate::{RambuError, Result};

/// Detector served over HTTP (`POST /predict`, `GET /health`)
pub struct YoloClient {
    client: Client,
    base_url: String,
    retries: u32,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    #[serde(alias = "class", alias = "cls")]
    class_id: u32,
    #[serde(alias = "conf", alias = "score")]
    confidence: f32,
    #[serde(default, alias = "box", alias = "xyxy")]
    bbox: Option<[f32; 4]>,
}

impl YoloClient {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .url
            .trim_end_matches('/')
            .trim_end_matches("/predict")
            .to_string();

        Ok(Self {
            client,
            base_url,
            retries: config.retries,
        })
    }

    async fn predict_once(&self, image: &PreparedImage) -> Result<Vec<Detection>> {
        let url = format!("{}/predict", self.base_url);
        let part = Part::bytes(image.jpeg.clone())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RambuError::DetectorUnavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RambuError::DetectorUnavailable(format!(
                "Detector returned status {}",
                response.status()
            )));
        }

        let body: PredictResponse = decode_reply(response).await?;
        Ok(body
            .detections
            .into_iter()
            .map(|d| Detection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: d.bbox,
            })
            .collect())
    }
}

#[async_trait]
impl SignDetector for YoloClient {
    fn name(&self) -> &'static str {
        "yolo"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                RambuError::DetectorUnavailable(format!(
                    "Cannot connect to detector at {}: {}",
                    self.base_url, e
                ))
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RambuError::DetectorUnavailable(format!(
                "Detector health check returned {}",
                response.status()
            )))
        }
    }

    async fn detect(&self, image: &PreparedImage) -> Result<Vec<Detection>> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = backoff(Duration::from_millis(250), attempt);
                warn!("Retrying detector request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.predict_once(image).await {
                Ok(detections) => {
                    debug!("Detector returned {} boxes", detections.len());
                    return Ok(detections);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RambuError::DetectorUnavailable("Unknown error".to_string())
        }))
    }
}
