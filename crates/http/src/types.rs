//! Request and response bodies exchanged with the backend

use crate::client::session::CredentialPair;
use serde::{Deserialize, Serialize};

/// Sign-in request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email or username
    pub identifier: String,
    pub password: String,
}

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub bio: String,
}

/// Email verification with the emailed code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

/// Body for endpoints that only take an address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Password reset with the emailed code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Message to the team; the sender's address is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
}

/// Response of the endpoints that may issue tokens
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl TokenResponse {
    /// Both tokens, if the response carries a complete pair
    #[must_use]
    pub fn credential_pair(&self) -> Option<CredentialPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(CredentialPair::new(access.clone(), refresh.clone()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("ok", &self.ok)
            .field("has_tokens", &self.credential_pair().is_some())
            .field("message", &self.message)
            .field("detail", &self.detail)
            .finish()
    }
}

/// Plain `{ok, message}` acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: String,
}

impl ChatMessage {
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub ok: bool,
    pub chat_id: i64,
}

/// Assistant answer to a sent message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub reply: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Recycling drop-off point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: i64,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Point ranked by distance from a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestPoint {
    #[serde(flatten)]
    pub point: Point,
    /// Missing when the point has no coordinates
    #[serde(default)]
    pub distance_km: Option<f64>,
    pub search_url: String,
    pub directions_url: String,
}

/// Map settings published by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub provider: String,
    /// Truncated key, for display only
    #[serde(default)]
    pub api_key: String,
    pub basemap_url: String,
    pub tiles: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(default)]
    pub whatsapp: Option<String>,
}

/// Terms or privacy text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalDocument {
    pub title: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_response_pair() {
        let response: TokenResponse = serde_json::from_value(json!({
            "ok": true, "access_token": "A1", "refresh_token": "R1"
        }))
        .unwrap();
        assert_eq!(
            response.credential_pair(),
            Some(CredentialPair::new("A1", "R1"))
        );

        let partial: TokenResponse =
            serde_json::from_value(json!({"ok": true, "access_token": "A1"})).unwrap();
        assert!(partial.credential_pair().is_none());
    }

    #[test]
    fn test_nearest_point_flattened() {
        let nearest: NearestPoint = serde_json::from_value(json!({
            "id": 3,
            "name": "Punto Limpio",
            "address": "Av. del Bombero",
            "lat": -2.17,
            "lon": -79.94,
            "category": "plástico",
            "notes": null,
            "source_url": null,
            "distance_km": 1.25,
            "search_url": "https://www.openstreetmap.org/search?query=Av.%20del%20Bombero",
            "directions_url": "https://www.openstreetmap.org/directions"
        }))
        .unwrap();
        assert_eq!(nearest.point.id, 3);
        assert_eq!(nearest.distance_km, Some(1.25));
        assert!(nearest.point.notes.is_none());
    }

    #[test]
    fn test_map_config_camel_case() {
        let config: MapConfig = serde_json::from_value(json!({
            "provider": "arcgis",
            "apiKey": "AAPK12...",
            "basemapUrl": "https://basemaps",
            "tiles": "https://tiles/{z}/{y}/{x}"
        }))
        .unwrap();
        assert_eq!(config.api_key, "AAPK12...");
    }

    #[test]
    fn test_contact_request_omits_missing_email() {
        let body = serde_json::to_value(ContactRequest {
            email: None,
            message: "hola".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"message": "hola"}));
    }
}
