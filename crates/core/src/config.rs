//! Client configuration
//!
//! Values are layered, lowest precedence first: built-in defaults, the JSON
//! settings file, `KATARA_*` environment variables, and an explicit API base
//! override (the `--api` flag).

use crate::error::CoreResult;
use crate::persist::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "https://katara-api.wiccagirl.online";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "KATARA";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend API, without a trailing slash
    pub api_base: String,

    /// `ArcGIS` key for client-side geocoding; empty disables it
    #[serde(default)]
    pub arcgis_api_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            arcgis_api_key: String::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from defaults, the settings file, the environment
    /// and an optional API base override
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be parsed
    pub fn load(settings_path: &Path, api_override: Option<&str>) -> CoreResult<Self> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("api_base", defaults.api_base)?
            .set_default("arcgis_api_key", defaults.arcgis_api_key)?
            .add_source(config::File::from(settings_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .set_override_option("api_base", api_override.map(str::to_string))?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        Ok(config.normalized())
    }

    /// Strip the trailing slash from the API base and whitespace from the key
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            api_base: normalize_api_base(&self.api_base),
            arcgis_api_key: self.arcgis_api_key.trim().to_string(),
        }
    }

    /// Whether client-side geocoding can run
    #[must_use]
    pub fn geocoding_enabled(&self) -> bool {
        !self.arcgis_api_key.is_empty()
    }

    /// Set and normalize the API base
    pub fn set_api_base(&mut self, value: &str) {
        self.api_base = normalize_api_base(value);
    }

    /// Set the `ArcGIS` key
    pub fn set_arcgis_key(&mut self, value: &str) {
        self.arcgis_api_key = value.trim().to_string();
    }

    /// Persist the configuration as the settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, settings_path: &Path) -> CoreResult<()> {
        write_json_atomic(settings_path, self)
    }
}

fn normalize_api_base(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
