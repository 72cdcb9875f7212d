//! Face comparison through an HTTP sidecar.

use async_trait::async_trait;
use domo_settings::FaceSettings;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::{AssistantError, Result};
use crate::{Upload, check_status, decode_json, http_client, trim_base};

const SERVICE: &str = "face";

/// Outcome of comparing two face images.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FaceMatch {
    /// Whether both images show the same person.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Encoding distance, when reported.
    #[serde(default)]
    pub distance: Option<f64>,
}

impl FaceMatch {
    /// Human-readable verdict returned to clients.
    pub fn message(&self) -> &'static str {
        if self.is_match {
            "Faces match"
        } else {
            "Faces differ"
        }
    }
}

/// Decides whether a camera frame shows the same person as a stored photo.
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    /// Compare the largest face in each image.
    async fn compare(&self, camera: Upload, stored: Upload) -> Result<FaceMatch>;
}

/// [`FaceMatcher`] backed by a sidecar exposing `POST /compare`.
pub struct SidecarFaceMatcher {
    client: reqwest::Client,
    base_url: String,
    max_bytes: u64,
    tolerance: f64,
}

impl SidecarFaceMatcher {
    /// Build a client from face settings.
    pub fn new(settings: &FaceSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.sidecar.timeout_ms)?,
            base_url: trim_base(&settings.sidecar.base_url),
            max_bytes: settings.sidecar.max_bytes,
            tolerance: settings.tolerance,
        })
    }

    fn check_size(&self, upload: &Upload) -> Result<()> {
        if upload.bytes.len() as u64 > self.max_bytes {
            return Err(AssistantError::TooLarge {
                size: upload.bytes.len(),
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FaceMatcher for SidecarFaceMatcher {
    #[instrument(skip_all, fields(tolerance = self.tolerance))]
    async fn compare(&self, camera: Upload, stored: Upload) -> Result<FaceMatch> {
        self.check_size(&camera)?;
        self.check_size(&stored)?;

        let form = reqwest::multipart::Form::new()
            .part("camera_image", camera.into_part("camera.jpg")?)
            .part("stored_image", stored.into_part("stored.jpg")?);

        let response = self
            .client
            .post(format!("{}/compare", self.base_url))
            .query(&[("tolerance", self.tolerance)])
            .multipart(form)
            .send()
            .await?;
        let result: FaceMatch = decode_json(SERVICE, check_status(SERVICE, response).await?).await?;
        debug!(is_match = result.is_match, distance = ?result.distance, "face comparison complete");
        Ok(result)
    }
}
