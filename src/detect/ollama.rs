// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama vision model used as a sign detector

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::labels::LabelTable;
use super::{backoff, decode_reply, Detection, PreparedImage, SignDetector};
use crate::config::DetectorConfig;
use crate::{RambuError, Result};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Normalize URL
        let base_url = config
            .url
            .trim_end_matches('/')
            .replace("/api/generate", "")
            .replace("/api/chat", "");

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            retries: config.retries,
        })
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        let tags: TagsResponse = decode_reply(response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn prompt() -> String {
        format!(
            "This photo shows an Indonesian traffic sign. Answer with exactly one name \
             from this list and nothing else, or NONE if no listed sign is visible:\n{}",
            LabelTable.prompt_list()
        )
    }

    /// Generate with image (for vision models)
    async fn generate_with_image(&self, prompt: &str, image_base64: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            images: vec![image_base64.to_string()],
        };

        debug!("Sending vision request to Ollama: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RambuError::DetectorUnavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RambuError::DetectorUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = decode_reply(response).await?;
        Ok(result.response)
    }
}

/// Turn the model's free-text answer into at most one detection
fn answer_to_detections(answer: &str) -> Vec<Detection> {
    match LabelTable.match_text(answer) {
        Some((label, confidence)) => vec![Detection {
            class_id: label.class_id,
            confidence,
            bbox: None,
        }],
        None => {
            debug!("Vision answer did not name a known sign: {:?}", answer.trim());
            Vec::new()
        }
    }
}

#[async_trait]
impl SignDetector for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let models = self.list_models().await.map_err(|e| {
            RambuError::DetectorUnavailable(format!(
                "Cannot connect to Ollama at {}: {}",
                self.base_url, e
            ))
        })?;

        if models
            .iter()
            .any(|m| m.starts_with(&self.model) || m == &format!("{}:latest", self.model))
        {
            Ok(())
        } else {
            Err(RambuError::DetectorUnavailable(format!(
                "Vision model '{}' not found. Available: {:?}",
                self.model, models
            )))
        }
    }

    async fn detect(&self, image: &PreparedImage) -> Result<Vec<Detection>> {
        let image_base64 = general_purpose::STANDARD.encode(&image.jpeg);
        let prompt = Self::prompt();
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = backoff(Duration::from_secs(1), attempt);
                warn!("Retrying Ollama request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.generate_with_image(&prompt, &image_base64).await {
                Ok(answer) => return Ok(answer_to_detections(&answer)),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RambuError::DetectorUnavailable("Unknown error".to_string())
        }))
    }
}
