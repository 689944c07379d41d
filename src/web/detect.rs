// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use axum::{
    extract::{Multipart, State},
    response::Json,
};
use std::sync::Arc;
use tracing::debug;

use super::upload::UploadForm;
use super::AppState;
use crate::detect::{prepare_image, recognize, DetectionOutcome};
use crate::storage::ImageKind;
use crate::Result;

/// Multipart `file` with a photo of a sign
pub async fn detect_sign(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DetectionOutcome>> {
    let mut form = UploadForm::collect(multipart).await?;
    let file = form.require_file("file")?;
    state.images.validate_extension(&file.filename)?;

    let config = state.detector.config();
    let max_side = config.input_size;
    let data = file.data.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_image(&data, max_side)).await??;
    debug!(
        "Prepared '{}' as {}x{} ({} bytes)",
        file.filename,
        prepared.width,
        prepared.height,
        prepared.jpeg.len()
    );

    if config.keep_uploads {
        let path = state
            .images
            .save(ImageKind::Uploads, &file.filename, &file.data)
            .await?;
        debug!("Kept upload at {}", path);
    }

    let detector = state.detector.get().await?;
    let outcome = recognize(
        &state.db,
        detector.as_ref(),
        &prepared,
        config.min_confidence,
    )
    .await?;
    Ok(Json(outcome))
}
