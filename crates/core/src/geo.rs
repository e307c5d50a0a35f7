//! Coordinates, distance and the geocode cache

use crate::error::CoreResult;
use crate::persist::{read_json, remove_file, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Longest normalized address kept in a cache key
const MAX_KEY_ADDRESS_CHARS: usize = 160;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in kilometres
    #[must_use]
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Haversine distance in kilometres
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = lat1.to_radians();
    let p2 = lat2.to_radians();
    let dp = (lat2 - lat1).to_radians();
    let dl = (lon2 - lon1).to_radians();
    let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Directions link for an address
#[must_use]
pub fn route_url(address: &str) -> String {
    Url::parse_with_params(
        "https://www.google.com/maps/dir/",
        &[("api", "1"), ("destination", address)],
    )
    .map(String::from)
    .unwrap_or_default()
}

/// Cache key for an address: lower-cased, trimmed, whitespace collapsed
#[must_use]
pub fn cache_key(address: &str) -> String {
    let normalized = address
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let truncated: String = normalized.chars().take(MAX_KEY_ADDRESS_CHARS).collect();
    format!("addr_{truncated}")
}

/// Persistent address to coordinate cache
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<String, Coordinates>,
    dirty: bool,
}

impl GeocodeCache {
    /// Load the cache; a missing or malformed file starts empty
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: BTreeMap<String, Coordinates> = read_json(&path).unwrap_or_default();
        debug!("Loaded {} geocode cache entries", entries.len());
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an address
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Coordinates> {
        self.entries.get(&cache_key(address)).copied()
    }

    /// Remember an address
    pub fn insert(&mut self, address: &str, coordinates: Coordinates) {
        self.entries.insert(cache_key(address), coordinates);
        self.dirty = true;
    }

    /// Whether entries were added since the last save
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the cache if it changed
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> CoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        write_json_atomic(&self.path, &self.entries)?;
        self.dirty = false;
        Ok(())
    }

    /// Drop every entry and delete the file
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file exists but cannot be removed.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.entries.clear();
        self.dirty = false;
        remove_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(
            cache_key("  Av. 9 de  Octubre\t100 "),
            "addr_av. 9 de octubre 100"
        );

        let long = "x".repeat(400);
        assert_eq!(cache_key(&long).len(), "addr_".len() + 160);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Guayaquil to Quito is roughly 270 km
        let d = haversine_km(-2.1894, -79.8891, -0.1807, -78.4678);
        assert!((d - 270.0).abs() < 10.0, "unexpected distance {d}");
        assert!(haversine_km(1.0, 1.0, 1.0, 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_route_url_encodes_address() {
        let url = route_url("Av. Juan Tanca Marengo & Calle 1");
        assert!(url.starts_with("https://www.google.com/maps/dir/?api=1&destination="));
        assert!(url.contains("%26"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_cache_persists_across_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("geocode.json");

        let mut cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());
        cache.insert("Malecón 2000", Coordinates::new(-2.19, -79.88));
        assert!(cache.is_dirty());
        cache.save().unwrap();
        assert!(!cache.is_dirty());

        let reloaded = GeocodeCache::load(&path);
        assert_eq!(
            reloaded.get("  malecón   2000"),
            Some(Coordinates::new(-2.19, -79.88))
        );
    }

    #[test]
    fn test_clear_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("geocode.json");

        let mut cache = GeocodeCache::load(&path);
        cache.insert("a", Coordinates::new(0.0, 0.0));
        cache.save().unwrap();
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(!path.exists());
        assert!(GeocodeCache::load(&path).is_empty());
    }
}
