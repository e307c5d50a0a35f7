//! Settings file management for `katara config`

use anyhow::{Result, bail};
use katara_core::persist::read_json;
use katara_core::{ClientConfig, GeocodeCache, StateDir};
use url::Url;

/// Effective configuration: defaults, settings file, environment, `--api`
pub fn load(state_dir: &StateDir, api_override: Option<&str>) -> Result<ClientConfig> {
    Ok(ClientConfig::load(&state_dir.settings_path(), api_override)?)
}

/// What the settings file alone holds
///
/// Edits start from this so environment overrides are never written back.
fn stored(state_dir: &StateDir) -> ClientConfig {
    read_json::<ClientConfig>(&state_dir.settings_path())
        .unwrap_or_default()
        .normalized()
}

pub fn set_api_base(state_dir: &StateDir, value: &str) -> Result<ClientConfig> {
    let url = Url::parse(value.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("API base must be an http or https URL");
    }

    let mut settings = stored(state_dir);
    settings.set_api_base(url.as_str());
    settings.save(&state_dir.settings_path())?;
    Ok(settings)
}

/// An empty key turns client-side geocoding off
pub fn set_arcgis_key(state_dir: &StateDir, value: &str) -> Result<ClientConfig> {
    let mut settings = stored(state_dir);
    settings.set_arcgis_key(value);
    settings.save(&state_dir.settings_path())?;
    Ok(settings)
}

/// Delete the geocode cache, returning how many entries it held
pub fn clear_cache(state_dir: &StateDir) -> Result<usize> {
    let mut cache = GeocodeCache::load(state_dir.geocode_cache_path());
    let entries = cache.len();
    cache.clear()?;
    Ok(entries)
}

/// Key with all but the first characters hidden
pub fn masked_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let visible: String = key.chars().take(6).collect();
    format!("{visible}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_core::Coordinates;
    use tempfile::TempDir;

    #[test]
    fn test_set_api_base_persists_normalized() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());

        set_api_base(&state_dir, " http://localhost:8000/ ").unwrap();
        let config = load(&state_dir, None).unwrap();
        assert_eq!(config.api_base, "http://localhost:8000");

        assert!(set_api_base(&state_dir, "ftp://example.com").is_err());
        assert!(set_api_base(&state_dir, "not a url").is_err());
    }

    #[test]
    fn test_arcgis_key_keeps_api_base() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());

        set_api_base(&state_dir, "https://api.example.com").unwrap();
        set_arcgis_key(&state_dir, "AAPK-test").unwrap();

        let config = load(&state_dir, None).unwrap();
        assert_eq!(config.api_base, "https://api.example.com");
        assert!(config.geocoding_enabled());

        set_arcgis_key(&state_dir, "").unwrap();
        assert!(!load(&state_dir, None).unwrap().geocoding_enabled());
    }

    #[test]
    fn test_set_api_base_replaces_unreadable_settings() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());
        std::fs::create_dir_all(state_dir.config_dir()).unwrap();
        std::fs::write(state_dir.settings_path(), "{\"api_base\": ").unwrap();

        set_api_base(&state_dir, "https://api.example.com").unwrap();
        assert_eq!(load(&state_dir, None).unwrap().api_base, "https://api.example.com");
    }

    #[test]
    fn test_clear_cache() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());

        let mut cache = GeocodeCache::load(state_dir.geocode_cache_path());
        cache.insert("Malecón 2000", Coordinates::new(-2.19, -79.88));
        cache.save().unwrap();

        assert_eq!(clear_cache(&state_dir).unwrap(), 1);
        assert!(!state_dir.geocode_cache_path().exists());
        assert_eq!(clear_cache(&state_dir).unwrap(), 0);
    }

    #[test]
    fn test_masked_key() {
        assert_eq!(masked_key(""), "(not set)");
        assert_eq!(masked_key("AAPK1234567890"), "AAPK12...");
    }
}
