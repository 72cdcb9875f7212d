//! Face comparison and voice command routes.
//!
//! Both forward multipart uploads to collaborators. A collaborator that is
//! not configured answers 503 `NOT_AVAILABLE`.

use axum::Json;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use domo_assistant::Upload;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::server::AppState;

/// `POST /compare-faces` response.
#[derive(Debug, Serialize)]
pub struct FaceVerdict {
    /// `true` when both images show the same person.
    pub status: bool,
    /// Human-readable verdict.
    pub message: String,
}

/// `POST /transcribe` response.
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    /// Assistant reply, or the raw transcript when no chat model is configured.
    pub text: String,
    /// Always `1.0`; kept for client compatibility.
    pub confidence: f64,
}

async fn read_upload(field: Field<'_>) -> Result<Upload, ApiError> {
    let mime_type = field.content_type().map(str::to_string);
    let file_name = field.file_name().map(str::to_string);
    let bytes = field.bytes().await?;
    Ok(Upload {
        bytes: bytes.to_vec(),
        mime_type,
        file_name,
    })
}

/// Collect the named file fields from a multipart body, ignoring others.
async fn collect_fields<const N: usize>(
    mut multipart: Multipart,
    names: [&str; N],
) -> Result<[Option<Upload>; N], ApiError> {
    let mut found: [Option<Upload>; N] = std::array::from_fn(|_| None);
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(slot) = names.iter().position(|n| *n == name) {
            found[slot] = Some(read_upload(field).await?);
        } else {
            debug!(field = %name, "ignoring multipart field");
        }
    }
    Ok(found)
}

fn required(upload: Option<Upload>, name: &str) -> Result<Upload, ApiError> {
    match upload {
        Some(u) if !u.bytes.is_empty() => Ok(u),
        Some(_) => Err(ApiError::InvalidInput(format!("{name} is empty"))),
        None => Err(ApiError::InvalidInput(format!("missing multipart field `{name}`"))),
    }
}

/// POST /compare-faces
pub async fn compare_faces(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FaceVerdict>, ApiError> {
    let matcher = state
        .collaborators
        .faces
        .clone()
        .ok_or_else(|| ApiError::NotAvailable("face comparison is not enabled".into()))?;

    let [camera, stored] = collect_fields(multipart?, ["camera_image", "stored_image"]).await?;
    let camera = required(camera, "camera_image")?;
    let stored = required(stored, "stored_image")?;

    let result = matcher.compare(camera, stored).await?;
    info!(is_match = result.is_match, "faces compared");
    Ok(Json(FaceVerdict {
        status: result.is_match,
        message: result.message().to_string(),
    }))
}

/// POST /transcribe
///
/// Transcribes the `file` field, then passes non-empty text to the chat
/// assistant when one is configured.
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let transcriber = state
        .collaborators
        .transcriber
        .clone()
        .ok_or_else(|| ApiError::NotAvailable("transcription is not enabled".into()))?;

    let [audio] = collect_fields(multipart?, ["file"]).await?;
    let audio = required(audio, "file")?;
    info!(
        size = audio.bytes.len(),
        mime_type = audio.mime_type.as_deref().unwrap_or("unknown"),
        "audio received"
    );

    let transcript = transcriber.transcribe(audio).await?;
    let text = match &state.collaborators.chat {
        Some(chat) if !transcript.text.trim().is_empty() => chat.reply(&transcript.text).await?,
        _ => transcript.text,
    };

    Ok(Json(TranscribeResponse {
        text,
        confidence: 1.0,
    }))
}
