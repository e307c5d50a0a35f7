//! Host side of the capability bridge for a terminal
//!
//! There is no file chooser or location service here: an image is whatever
//! path the user passed, and the location is whatever coordinates they typed.

use async_trait::async_trait;
use katara_core::{CapabilityOutcome, Coordinates, HostShell, ImageAttachment};
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliHost {
    image_path: Option<PathBuf>,
    location: Option<Coordinates>,
}

impl CliHost {
    pub fn new(image_path: Option<PathBuf>, lat: Option<f64>, lon: Option<f64>) -> Self {
        let location = match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        Self {
            image_path,
            location,
        }
    }

    pub fn wants_image(&self) -> bool {
        self.image_path.is_some()
    }

    pub fn wants_location(&self) -> bool {
        self.location.is_some()
    }
}

#[async_trait]
impl HostShell for CliHost {
    async fn pick_image(&self) -> CapabilityOutcome<ImageAttachment> {
        let Some(path) = &self.image_path else {
            return CapabilityOutcome::denied("no image selected");
        };
        match ImageAttachment::from_path(path) {
            Ok(image) => CapabilityOutcome::Granted(image),
            Err(e) => CapabilityOutcome::denied(format!("cannot read {}: {e}", path.display())),
        }
    }

    async fn current_location(&self) -> CapabilityOutcome<Coordinates> {
        match self.location {
            Some(location) if valid(location) => CapabilityOutcome::Granted(location),
            Some(_) => CapabilityOutcome::denied("coordinates out of range"),
            None => CapabilityOutcome::denied("location not provided"),
        }
    }
}

fn valid(location: Coordinates) -> bool {
    (-90.0..=90.0).contains(&location.lat) && (-180.0..=180.0).contains(&location.lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_core::CapabilityBridge;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_image_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lata.PNG");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let bridge = CapabilityBridge::new();
        let host = CliHost::new(Some(path), None, None);
        let CapabilityOutcome::Granted(image) = bridge.pick_image(&host).await else {
            panic!("image should be granted");
        };

        assert_eq!(image.file_name, "lata.PNG");
        assert_eq!(image.mime, "image/png");
        assert!(!bridge.image.resolve(CapabilityOutcome::denied("late")));
    }

    #[tokio::test]
    async fn test_missing_file_is_denied() {
        let host = CliHost::new(Some(PathBuf::from("/nonexistent/foto.jpg")), None, None);
        let outcome = CapabilityBridge::new().pick_image(&host).await;
        assert!(!outcome.is_granted());
    }

    #[tokio::test]
    async fn test_location_needs_both_coordinates() {
        let bridge = CapabilityBridge::new();

        let host = CliHost::new(None, Some(-2.19), None);
        assert!(!bridge.current_location(&host).await.is_granted());

        let host = CliHost::new(None, Some(-2.19), Some(-79.88));
        assert_eq!(
            bridge.current_location(&host).await,
            CapabilityOutcome::Granted(Coordinates::new(-2.19, -79.88))
        );

        let host = CliHost::new(None, Some(120.0), Some(0.0));
        assert!(!bridge.current_location(&host).await.is_granted());
    }
}
