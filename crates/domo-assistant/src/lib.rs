//! # domo-assistant
//!
//! HTTP clients for the services the hub delegates media work to.
//!
//! - [`transcriber`]: speech-to-text sidecar
//! - [`face`]: face-comparison sidecar
//! - [`chat`]: local chat model (Ollama `/api/chat`) with a rolling
//!   conversation
//!
//! Each collaborator sits behind a trait so the server can run with any of
//! them switched off and tests can substitute fakes.

#![deny(unsafe_code)]

pub mod chat;
pub mod errors;
pub mod face;
pub mod transcriber;

pub use chat::{ChatAssistant, ChatMessage, OllamaAssistant};
pub use errors::{AssistantError, Result};
pub use face::{FaceMatch, FaceMatcher, SidecarFaceMatcher};
pub use transcriber::{SidecarTranscriber, Transcriber, Transcript};

/// An uploaded file forwarded to a sidecar.
#[derive(Clone, Debug)]
pub struct Upload {
    /// Raw bytes.
    pub bytes: Vec<u8>,
    /// Declared content type, if any.
    pub mime_type: Option<String>,
    /// Client-side file name, if any.
    pub file_name: Option<String>,
}

impl Upload {
    /// Build a multipart part, falling back to `default_name` for the file name.
    pub(crate) fn into_part(self, default_name: &str) -> Result<reqwest::multipart::Part> {
        let name = self.file_name.unwrap_or_else(|| default_name.to_string());
        let part = reqwest::multipart::Part::bytes(self.bytes).file_name(name);
        match self.mime_type {
            Some(mime) => Ok(part.mime_str(&mime)?),
            None => Ok(part),
        }
    }
}

pub(crate) fn http_client(timeout_ms: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()?)
}

/// Turn a non-2xx response into [`AssistantError::Status`].
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AssistantError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Read a JSON body, reporting shape mismatches as [`AssistantError::Decode`].
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| AssistantError::Decode {
        service,
        message: e.to_string(),
    })
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
