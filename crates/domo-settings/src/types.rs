//! Settings types with compiled defaults.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only
//! needs the keys it changes.

use domo_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomoSettings {
    /// HTTP/WebSocket server.
    pub server: ServerSettings,
    /// Device store.
    pub store: StoreSettings,
    /// Media and language-model collaborators.
    pub assistant: AssistantSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Server network and live-subscription settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum concurrently registered live subscribers.
    pub max_subscribers: usize,
    /// Per-subscriber outbound queue depth. A full queue evicts the subscriber.
    pub send_buffer: usize,
    /// Per-message socket write timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Server ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a subscriber silent for this long, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Maximum multipart upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_subscribers: 1024,
            send_buffer: 64,
            send_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Device store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database file. `None` resolves to `~/.domo/domo.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Collaborator services reached over HTTP.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantSettings {
    /// Speech-to-text sidecar.
    pub transcription: SidecarSettings,
    /// Face-comparison sidecar.
    pub face: FaceSettings,
    /// Chat-completion model server.
    pub chat: ChatSettings,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            transcription: SidecarSettings {
                enabled: false,
                base_url: "http://127.0.0.1:8787".to_string(),
                timeout_ms: 180_000,
                max_bytes: 25 * 1024 * 1024,
            },
            face: FaceSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

/// A plain HTTP sidecar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidecarSettings {
    /// Whether the hub should call the sidecar at all.
    pub enabled: bool,
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum payload size in bytes.
    pub max_bytes: u64,
}

impl Default for SidecarSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_ms: 60_000,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Face-comparison sidecar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceSettings {
    /// Connection settings.
    #[serde(flatten)]
    pub sidecar: SidecarSettings,
    /// Encoding distance at or below which two faces match.
    pub tolerance: f64,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            sidecar: SidecarSettings {
                base_url: "http://127.0.0.1:8788".to_string(),
                ..SidecarSettings::default()
            },
            tolerance: 0.6,
        }
    }
}

/// Chat-completion settings (Ollama-compatible `/api/chat`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Whether transcripts are passed to the model.
    pub enabled: bool,
    /// Model server base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling.
    pub top_p: f64,
    /// Maximum user/assistant messages kept in the conversation.
    pub max_history: usize,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Application description appended to the system prompt.
    pub app_context: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434".to_string(),
            model: "gemma2:2b".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            max_history: 20,
            timeout_ms: 120_000,
            app_context: DEFAULT_APP_CONTEXT.to_string(),
        }
    }
}

/// Description of the companion mobile app given to the assistant.
pub const DEFAULT_APP_CONTEXT: &str = "\
The app is a multi-platform home automation client.
Features: switch devices on or off from the Energy page, Devices tab; \
watch gas, smoke and temperature sensors from the Security page, Sensors tab; \
camera intrusion detection that records photos of unknown visitors; \
live consumption and bill payment from the Energy page, Overview tab.";

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
