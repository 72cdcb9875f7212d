//! # domo-settings
//!
//! Configuration for the domo hub, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DomoSettings::default()`]
//! 2. **User file**: `~/.domo/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `DOMO_*` overrides (highest priority)
//!
//! Command-line flags in the `domo-hub` binary are applied after all three.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, domo_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
