//! Address geocoding
//!
//! Lookups are best effort: any failure is logged and reported as `None`.

use async_trait::async_trait;
use katara_core::Coordinates;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// `ArcGIS` World geocoder
pub const ARCGIS_GEOCODE_URL: &str =
    "https://geocode-api.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

/// Resolves a free-form address to a position
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<Coordinates>;
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    location: Option<CandidateLocation>,
}

#[derive(Debug, Deserialize)]
struct CandidateLocation {
    x: f64,
    y: f64,
}

/// `findAddressCandidates` client
pub struct ArcGisGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ArcGisGeocoder {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(ARCGIS_GEOCODE_URL, api_key)
    }

    /// Point the geocoder at another endpoint
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, reqwest::Error> {
        let response: CandidatesResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("f", "json"),
                ("singleLine", address),
                ("maxLocations", "1"),
                ("outFields", "Match_addr,Addr_type"),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.location)
            .map(|location| Coordinates::new(location.y, location.x)))
    }
}

#[async_trait]
impl Geocoder for ArcGisGeocoder {
    async fn geocode(&self, address: &str) -> Option<Coordinates> {
        match self.lookup(address).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Geocoding {address:?} failed: {e}");
                None
            }
        }
    }
}
