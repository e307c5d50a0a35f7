//! Katara backend client
//!
//! [`Gateway`] carries every request and owns the refresh cycle;
//! [`KataraClient`] layers the typed endpoints on top of it.

pub mod api;
pub mod error;
pub mod gateway;
pub mod geocode;
pub mod points;
pub mod request;
pub mod session;

pub use api::{KataraClient, OutgoingMessage, ProfileUpdate, RecognitionRequest, decode};
pub use error::ClientError;
pub use gateway::{Gateway, GatewayBuilder};
pub use geocode::{ArcGisGeocoder, Geocoder};
pub use points::{filter_points, resolve_missing_coordinates};
pub use request::{ApiRequest, FormPayload, RequestBody};
pub use session::{CredentialPair, FileTokenStore, MemoryTokenStore, Session, TokenStore};
