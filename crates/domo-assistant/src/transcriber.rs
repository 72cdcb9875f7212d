//! Speech-to-text through an HTTP sidecar.

use async_trait::async_trait;
use domo_settings::SidecarSettings;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::{AssistantError, Result};
use crate::{Upload, check_status, decode_json, http_client, trim_base};

const SERVICE: &str = "transcription";

/// Text recognised in an audio clip.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Transcript {
    /// Recognised text, possibly empty.
    pub text: String,
    /// Detected language, when the sidecar reports one.
    #[serde(default)]
    pub language: Option<String>,
}

/// Converts recorded speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip.
    async fn transcribe(&self, audio: Upload) -> Result<Transcript>;
}

/// Map an audio MIME type to a file name with the extension the sidecar
/// uses to pick a container decoder.
fn filename_for_mime(mime_type: Option<&str>) -> String {
    let ext = match mime_type.unwrap_or_default() {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/vorbis" => "ogg",
        "audio/webm" => "webm",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/3gpp" => "3gp",
        _ => "wav",
    };
    format!("audio.{ext}")
}

/// [`Transcriber`] backed by a sidecar exposing `POST /transcribe`.
pub struct SidecarTranscriber {
    client: reqwest::Client,
    base_url: String,
    max_bytes: u64,
}

impl SidecarTranscriber {
    /// Build a client from sidecar settings.
    pub fn new(settings: &SidecarSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout_ms)?,
            base_url: trim_base(&settings.base_url),
            max_bytes: settings.max_bytes,
        })
    }
}

#[async_trait]
impl Transcriber for SidecarTranscriber {
    #[instrument(skip_all, fields(size = audio.bytes.len()))]
    async fn transcribe(&self, audio: Upload) -> Result<Transcript> {
        if audio.bytes.len() as u64 > self.max_bytes {
            return Err(AssistantError::TooLarge {
                size: audio.bytes.len(),
                max: self.max_bytes,
            });
        }

        let default_name = filename_for_mime(audio.mime_type.as_deref());
        let form = reqwest::multipart::Form::new().part("audio", audio.into_part(&default_name)?);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let transcript: Transcript = decode_json(SERVICE, check_status(SERVICE, response).await?).await?;
        debug!(chars = transcript.text.len(), "transcription complete");
        Ok(transcript)
    }
}
