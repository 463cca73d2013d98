//! Upload classification endpoint
//!
//! `POST /upload` takes a multipart form with a `file` part, stages the
//! payload in the upload directory, runs it through the shared pipeline
//! and returns the top-1 label.

use std::path::Path;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Successful classification response
#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub message: String,
    /// Client-supplied file name, echoed back untouched
    pub filename: String,
    /// Predicted label
    pub prediction: String,
    /// Softmax confidence, formatted "NN.NN%"
    pub confidence: String,
}

/// POST /upload
///
/// The client file name is never used as a disk path; the payload is
/// staged under a random name and only the extension is kept as a format
/// hint for the decoder. The staged file is removed when the handler
/// returns, success or not.
pub async fn classify_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClassificationResponse>> {
    let request_id = Uuid::new_v4();

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file part".into()));
    };
    if filename.is_empty() {
        return Err(ApiError::BadRequest("No selected file".into()));
    }

    info!(%request_id, filename = %filename, bytes = bytes.len(), "classification upload received");

    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&extension)
        .tempfile_in(&state.upload_dir)?;
    tokio::fs::write(staged.path(), &bytes).await?;

    match state.inference.classify_file(staged.path().to_path_buf()).await {
        Ok(prediction) => {
            info!(
                %request_id,
                label = %prediction.label,
                confidence = %prediction.confidence_display(),
                "classification complete"
            );
            Ok(Json(ClassificationResponse {
                message: "Prediction successful".to_string(),
                filename,
                confidence: prediction.confidence_display(),
                prediction: prediction.label,
            }))
        }
        Err(e) => {
            warn!(%request_id, stage = e.stage(), error = %e, "classification failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build classification routes
pub fn classify_routes() -> Router<AppState> {
    Router::new().route("/upload", post(classify_upload))
}
