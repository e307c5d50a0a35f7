//! Local work on the drop-off point list

use super::geocode::Geocoder;
use crate::types::Point;
use katara_core::{Coordinates, CoreResult, GeocodeCache};
use std::time::Duration;
use tracing::{debug, info};

/// Lookups allowed per run
pub const MAX_GEOCODES_PER_RUN: usize = 12;

/// Pause between lookups
pub const GEOCODE_PAUSE: Duration = Duration::from_millis(220);

/// Appended to addresses before geocoding
pub const CITY_SUFFIX: &str = ", Guayaquil, Ecuador";

/// Points whose name, address, category or notes contain `query`
///
/// Matching is case-insensitive; a blank query keeps every point.
#[must_use]
pub fn filter_points<'a>(points: &'a [Point], query: &str) -> Vec<&'a Point> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return points.iter().collect();
    }

    points
        .iter()
        .filter(|point| {
            [
                Some(point.name.as_str()),
                Some(point.address.as_str()),
                point.category.as_deref(),
                point.notes.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
        })
        .collect()
}

#[must_use]
pub fn coordinates_of(point: &Point) -> Option<Coordinates> {
    match (point.lat, point.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    }
}

/// Fill in coordinates the backend did not have
///
/// Cached addresses are applied first. At most [`MAX_GEOCODES_PER_RUN`]
/// uncached addresses are looked up, [`GEOCODE_PAUSE`] apart. The cache is
/// saved when anything new was learned. Returns the number of lookups made.
///
/// # Errors
///
/// Returns an error if the updated cache cannot be saved.
pub async fn resolve_missing_coordinates(
    points: &mut [Point],
    cache: &mut GeocodeCache,
    geocoder: &dyn Geocoder,
) -> CoreResult<usize> {
    let mut lookups = 0;

    for point in points.iter_mut() {
        if coordinates_of(point).is_some() {
            continue;
        }
        if let Some(cached) = cache.get(&point.address) {
            point.lat = Some(cached.lat);
            point.lon = Some(cached.lon);
            continue;
        }
        if lookups >= MAX_GEOCODES_PER_RUN {
            debug!("Geocode limit reached, leaving remaining points unresolved");
            break;
        }

        if lookups > 0 {
            tokio::time::sleep(GEOCODE_PAUSE).await;
        }
        lookups += 1;

        let query = format!("{}{CITY_SUFFIX}", point.address);
        if let Some(found) = geocoder.geocode(&query).await {
            point.lat = Some(found.lat);
            point.lon = Some(found.lon);
            cache.insert(&point.address, found);
        }
    }

    if cache.is_dirty() {
        cache.save()?;
        info!("Geocoded {lookups} addresses, cache now holds {}", cache.len());
    }
    Ok(lookups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn point(id: i64, name: &str, address: &str, coords: Option<(f64, f64)>) -> Point {
        Point {
            id,
            name: name.into(),
            address: address.into(),
            lat: coords.map(|c| c.0),
            lon: coords.map(|c| c.1),
            category: None,
            notes: None,
            source_url: None,
        }
    }

    /// Answers every address with a fixed position and records the queries
    #[derive(Default)]
    struct RecordingGeocoder {
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for RecordingGeocoder {
        async fn geocode(&self, address: &str) -> Option<Coordinates> {
            self.queries.lock().unwrap().push(address.to_string());
            (!self.fail).then(|| Coordinates::new(-2.19, -79.88))
        }
    }

    #[test]
    fn test_filter_points_matches_any_field() {
        let mut bottle_bank = point(1, "Punto Verde", "Av. Quito", None);
        bottle_bank.category = Some("Vidrio".into());
        let mut market = point(2, "Mercado", "Calle 10", None);
        market.notes = Some("Recibe PLÁSTICO limpio".into());
        let points = vec![bottle_bank, market];

        let ids = |query: &str| -> Vec<i64> {
            filter_points(&points, query).iter().map(|p| p.id).collect()
        };
        assert_eq!(ids("vidrio"), [1]);
        assert_eq!(ids("plástico"), [2]);
        assert_eq!(ids("calle"), [2]);
        assert_eq!(ids("  "), [1, 2]);
        assert!(ids("cartón").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_uses_cache_and_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = GeocodeCache::load(temp_dir.path().join("geocode.json"));
        cache.insert("Av. Quito", Coordinates::new(-2.1, -79.9));

        let mut points = vec![
            point(1, "A", "Av. Quito", None),
            point(2, "B", "Calle 10", None),
            point(3, "C", "Malecón", Some((-2.2, -79.8))),
        ];
        let geocoder = RecordingGeocoder::default();

        let lookups = resolve_missing_coordinates(&mut points, &mut cache, &geocoder)
            .await
            .unwrap();

        assert_eq!(lookups, 1);
        assert_eq!(
            *geocoder.queries.lock().unwrap(),
            ["Calle 10, Guayaquil, Ecuador"]
        );
        assert_eq!(points[0].lat, Some(-2.1));
        assert_eq!(points[1].lat, Some(-2.19));
        assert_eq!(points[2].lat, Some(-2.2));

        let reloaded = GeocodeCache::load(temp_dir.path().join("geocode.json"));
        assert_eq!(reloaded.get("calle   10"), Some(Coordinates::new(-2.19, -79.88)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_stops_at_limit() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = GeocodeCache::load(temp_dir.path().join("geocode.json"));
        let mut points: Vec<Point> = (0..20)
            .map(|i| point(i, "P", &format!("Calle {i}"), None))
            .collect();
        let geocoder = RecordingGeocoder {
            fail: true,
            ..RecordingGeocoder::default()
        };

        let lookups = resolve_missing_coordinates(&mut points, &mut cache, &geocoder)
            .await
            .unwrap();

        assert_eq!(lookups, MAX_GEOCODES_PER_RUN);
        assert!(points.iter().all(|p| p.lat.is_none()));
        assert!(cache.is_empty());
        assert!(!temp_dir.path().join("geocode.json").exists());
    }
}
