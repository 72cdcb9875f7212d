//! Settings resolution.
//!
//! Compiled defaults, then `~/.domo/settings.json` merged key by key, then
//! `DOMO_*` environment variables. Objects merge recursively; any other
//! value in the file replaces the default; `null` leaves the default alone.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::DomoSettings;

/// Directory holding the settings file and the default database.
pub fn domo_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".domo")
}

/// Resolve the path to the settings file (`~/.domo/settings.json`).
pub fn settings_path() -> PathBuf {
    domo_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DomoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<DomoSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<DomoSettings> {
    let defaults = serde_json::to_value(DomoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Overlay `source` onto `target`, recursing into objects.
pub fn deep_merge(mut target: Value, source: Value) -> Value {
    overlay(&mut target, source);
    target
}

fn overlay(slot: &mut Value, incoming: Value) {
    match (slot, incoming) {
        (_, Value::Null) => {}
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                match existing.get_mut(&key) {
                    Some(current) => overlay(current, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `DOMO_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut DomoSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("DOMO_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64_in("DOMO_PORT", 1, 65_535).and_then(|v| u16::try_from(v).ok()) {
        settings.server.port = v;
    }
    if let Some(v) = env.u64_in("DOMO_MAX_SUBSCRIBERS", 1, 1_000_000).and_then(|v| usize::try_from(v).ok()) {
        settings.server.max_subscribers = v;
    }
    if let Some(v) = env.u64_in("DOMO_SEND_BUFFER", 1, 65_536).and_then(|v| usize::try_from(v).ok()) {
        settings.server.send_buffer = v;
    }
    if let Some(v) = env.u64_in("DOMO_SEND_TIMEOUT_MS", 10, 600_000) {
        settings.server.send_timeout_ms = v;
    }
    if let Some(v) = env.u64_in("DOMO_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64_in("DOMO_HEARTBEAT_TIMEOUT_MS", 100, 3_600_000) {
        settings.server.heartbeat_timeout_ms = v;
    }

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("DOMO_DB_PATH") {
        settings.store.db_path = Some(v);
    }

    // ── Collaborators ───────────────────────────────────────────────
    if let Some(v) = env.bool("DOMO_TRANSCRIBE_ENABLED") {
        settings.assistant.transcription.enabled = v;
    }
    if let Some(v) = env.string("DOMO_TRANSCRIBE_URL") {
        settings.assistant.transcription.base_url = v;
    }
    if let Some(v) = env.bool("DOMO_FACE_ENABLED") {
        settings.assistant.face.sidecar.enabled = v;
    }
    if let Some(v) = env.string("DOMO_FACE_URL") {
        settings.assistant.face.sidecar.base_url = v;
    }
    if let Some(v) = env.bool("DOMO_CHAT_ENABLED") {
        settings.assistant.chat.enabled = v;
    }
    if let Some(v) = env.string("DOMO_CHAT_URL") {
        settings.assistant.chat.base_url = v;
    }
    if let Some(v) = env.string("DOMO_CHAT_MODEL") {
        settings.assistant.chat.model = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("DOMO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("DOMO_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "DOMO_LOG_FORMAT", error = %e, "ignoring env var"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Truthy (`true`, `1`, `yes`, `on`) or falsy (`false`, `0`, `no`, `off`), any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim();
    if TRUTHY.iter().any(|t| val.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| val.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Integer within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.trim().parse::<u64>().ok().filter(|n| (min..=max).contains(n))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use domo_core::logging::LogFormat;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn file_value_wins_inside_nested_section() {
        let defaults = json!({"server": {"port": 8000, "host": "0.0.0.0"}, "logging": {"level": "info"}});
        let file = json!({"server": {"port": 8100}});
        let merged = deep_merge(defaults, file);
        assert_eq!(merged, json!({"server": {"port": 8100, "host": "0.0.0.0"}, "logging": {"level": "info"}}));
    }

    #[test]
    fn null_in_file_keeps_default() {
        let merged = deep_merge(json!({"store": {"dbPath": "/data/domo.db"}}), json!({"store": {"dbPath": null}}));
        assert_eq!(merged["store"]["dbPath"], "/data/domo.db");
    }

    #[test]
    fn new_null_key_is_not_added() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": null}));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn scalar_replaces_section() {
        let merged = deep_merge(json!({"assistant": {"chat": {"enabled": false}}}), json!({"assistant": 7}));
        assert_eq!(merged["assistant"], 7);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"maxSubscribers": 3}, "assistant": {"chat": {"model": "phi3:mini"}}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.max_subscribers, 3);
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.assistant.chat.model, "phi3:mini");
        assert!((settings.assistant.chat.temperature - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_file_layer(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut s = DomoSettings::default();
        apply_env_overrides(
            &mut s,
            env_of(&[
                ("DOMO_PORT", "8100"),
                ("DOMO_MAX_SUBSCRIBERS", "5"),
                ("DOMO_CHAT_ENABLED", "yes"),
                ("DOMO_DB_PATH", "/var/lib/domo.db"),
                ("DOMO_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(s.server.port, 8100);
        assert_eq!(s.server.max_subscribers, 5);
        assert!(s.assistant.chat.enabled);
        assert_eq!(s.store.db_path.as_deref(), Some("/var/lib/domo.db"));
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut s = DomoSettings::default();
        apply_env_overrides(
            &mut s,
            env_of(&[
                ("DOMO_PORT", "99999"),
                ("DOMO_FACE_ENABLED", "maybe"),
                ("DOMO_HOST", ""),
                ("DOMO_LOG_FORMAT", "xml"),
            ]),
        );
        assert_eq!(s.server.port, 8000);
        assert!(!s.assistant.face.sidecar.enabled);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.format, LogFormat::Compact);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nope"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("10", 10, 20), Some(10));
        assert_eq!(parse_u64_range(" 20 ", 10, 20), Some(20));
        assert_eq!(parse_u64_range("21", 10, 20), None);
        assert_eq!(parse_u64_range("-1", 0, 20), None);
    }
}
