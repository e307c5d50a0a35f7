//! Typed backend endpoints
//!
//! Every method goes through the [`Gateway`]; responses are decoded with
//! [`decode`], which turns non-success statuses and `ok: false` bodies into
//! [`ClientError`]s carrying the server's `detail`.

use super::error::ClientError;
use super::gateway::Gateway;
use super::request::{ApiRequest, FormPayload};
use crate::types::{
    ChangePasswordRequest, ChatMessage, ChatSummary, ContactRequest, ContactResponse,
    CreateChatResponse, EmailRequest, LegalDocument, LoginRequest, MapConfig, NearestPoint,
    Point, Profile, RegisterRequest, ResetPasswordRequest, SendMessageResponse, StatusResponse,
    TokenResponse, VerifyEmailRequest,
};
use katara_core::{Coordinates, ImageAttachment};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Question sent with a photo when the user asked nothing
pub const DEFAULT_RECOGNITION_QUESTION: &str =
    "¿Qué es esto y cómo debo desecharlo o reciclarlo en Guayaquil?";

/// Title of the chat that holds recognition history
pub const RECOGNITION_CHAT_TITLE: &str = "Reconocimiento";

/// Title used when creating a chat without one
pub const DEFAULT_CHAT_TITLE: &str = "Katara";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;

/// Decode a response body
///
/// A body that is not JSON is wrapped as `{"raw": text}` so the status check
/// still runs.
///
/// # Errors
///
/// Returns a [`ClientError`] for a non-success status, an `ok: false` body, or
/// a body that does not match `T`.
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

    if !status.is_success() {
        return Err(ClientError::from_status(status, detail_of(&body)));
    }
    if body.get("ok") == Some(&Value::Bool(false)) {
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            detail: detail_of(&body),
        });
    }

    Ok(serde_json::from_value(body)?)
}

/// Human-readable failure text from an error body
///
/// Handles plain `detail` strings, validation error lists and the `error`
/// field some endpoints use.
#[must_use]
pub fn detail_of(body: &Value) -> Option<String> {
    match body.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Array(items)) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(Value::as_str))
            .map(str::to_string),
        _ => body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Message composed in a chat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub text: String,
    pub image: Option<ImageAttachment>,
    /// Sent once with this message only
    pub location: Option<Coordinates>,
}

impl OutgoingMessage {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }

    /// Text or an image is required
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] when the message is empty.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.text.trim().is_empty() && self.image.is_none() {
            return Err(ClientError::Validation(
                "Write something or attach a photo.".to_string(),
            ));
        }
        Ok(())
    }

    fn to_form(&self) -> FormPayload {
        let mut form = FormPayload::new().text("text", self.text.trim());
        if let Some(image) = &self.image {
            form = form.file(
                "image",
                image.file_name.clone(),
                image.mime.clone(),
                image.bytes.clone(),
            );
        }
        if let Some(location) = self.location {
            form = form
                .text("lat", location.lat.to_string())
                .text("lon", location.lon.to_string());
        }
        form
    }
}

/// Photo submitted for waste recognition
#[derive(Debug, Clone, Default)]
pub struct RecognitionRequest {
    pub image: Option<ImageAttachment>,
    pub question: Option<String>,
}

impl RecognitionRequest {
    fn into_message(self) -> Result<OutgoingMessage, ClientError> {
        let image = self
            .image
            .ok_or_else(|| ClientError::Validation("Attach a photo.".to_string()))?;
        let question = self
            .question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| DEFAULT_RECOGNITION_QUESTION.to_string());
        Ok(OutgoingMessage::text(question).with_image(image))
    }
}

/// Profile fields to change; unset fields are left alone
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<ImageAttachment>,
}

impl ProfileUpdate {
    fn to_form(&self) -> Result<FormPayload, ClientError> {
        let mut form = FormPayload::new();
        if let Some(username) = &self.username {
            validate_username(username.trim())?;
            form = form.text("username", username.trim());
        }
        if let Some(bio) = &self.bio {
            form = form.text("bio", bio.clone());
        }
        if let Some(avatar) = &self.avatar {
            form = form.file(
                "avatar",
                avatar.file_name.clone(),
                avatar.mime.clone(),
                avatar.bytes.clone(),
            );
        }
        if form.is_empty() {
            return Err(ClientError::Validation("Nothing to update.".to_string()));
        }
        Ok(form)
    }
}

fn validate_password(password: &str) -> Result<(), ClientError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::Validation(format!(
            "Passwords need at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), ClientError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ClientError::Validation(format!(
            "Usernames need {MIN_USERNAME_LEN} to {MAX_USERNAME_LEN} characters."
        )));
    }
    Ok(())
}

/// Client for the recycling-assistant backend
#[derive(Clone)]
pub struct KataraClient {
    gateway: Gateway,
}

impl KataraClient {
    #[must_use]
    pub const fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.gateway.is_authenticated()
    }

    async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.gateway.call(&request).await?;
        match decode(response).await {
            // A 401 on a public call is a refusal, not an expired session
            Err(ClientError::AuthenticationFailed(detail)) if !request.auth => {
                Err(ClientError::Rejected {
                    status: 401,
                    detail,
                })
            }
            // The refresh cycle could not recover; the user must sign in again
            Err(e @ ClientError::AuthenticationFailed(_)) => {
                if let Err(clear_err) = self.gateway.logout() {
                    warn!("Failed to clear expired session: {clear_err}");
                }
                Err(e)
            }
            result => result,
        }
    }

    /// Store the pair from an auth response, if it carries one
    fn adopt_tokens(&self, response: &TokenResponse) -> Result<bool, ClientError> {
        match response.credential_pair() {
            Some(pair) => {
                self.gateway.sign_in(pair)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // Authentication

    /// Sign in with an email or username
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/login").public().json(&LoginRequest {
            identifier: identifier.trim().to_string(),
            password: password.to_string(),
        })?;
        let response: TokenResponse = self.send(request).await?;
        if !self.adopt_tokens(&response)? {
            return Err(ClientError::Rejected {
                status: 200,
                detail: response.detail,
            });
        }
        info!("Logged in as {}", identifier.trim());
        Ok(())
    }

    /// Create an account; the server emails a verification code
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn register(&self, registration: RegisterRequest) -> Result<TokenResponse, ClientError> {
        validate_username(registration.username.trim())?;
        validate_password(&registration.password)?;
        let request = ApiRequest::post("/auth/register")
            .public()
            .json(&registration)?;
        let response: TokenResponse = self.send(request).await?;
        self.adopt_tokens(&response)?;
        Ok(response)
    }

    /// Confirm the emailed code; signs the user in
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/verify-email")
            .public()
            .json(&VerifyEmailRequest {
                email: email.trim().to_string(),
                code: code.trim().to_string(),
            })?;
        let response: TokenResponse = self.send(request).await?;
        if !self.adopt_tokens(&response)? {
            return Err(ClientError::Rejected {
                status: 200,
                detail: response.detail,
            });
        }
        Ok(())
    }

    /// Send a new verification code
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn resend_verification(&self, email: &str) -> Result<StatusResponse, ClientError> {
        let request = ApiRequest::post("/auth/resend-verification")
            .public()
            .json(&EmailRequest {
                email: email.trim().to_string(),
            })?;
        self.send(request).await
    }

    /// Request a password reset code
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn forgot_password(&self, email: &str) -> Result<StatusResponse, ClientError> {
        let request = ApiRequest::post("/auth/forgot-password")
            .public()
            .json(&EmailRequest {
                email: email.trim().to_string(),
            })?;
        self.send(request).await
    }

    /// Set a new password with the emailed code
    ///
    /// Returns true when the server also signed the user in.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<bool, ClientError> {
        validate_password(new_password)?;
        let request = ApiRequest::post("/auth/reset-password")
            .public()
            .json(&ResetPasswordRequest {
                email: email.trim().to_string(),
                code: code.trim().to_string(),
                new_password: new_password.to_string(),
            })?;
        let response: TokenResponse = self.send(request).await?;
        self.adopt_tokens(&response)
    }

    /// Forget the session locally
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be cleared.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.gateway.logout()
    }

    // Profile

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn me(&self) -> Result<Profile, ClientError> {
        self.send(ApiRequest::get("/me")).await
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<StatusResponse, ClientError> {
        let request = ApiRequest::patch("/me").form(update.to_form()?);
        self.send(request).await
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<StatusResponse, ClientError> {
        validate_password(new_password)?;
        let request = ApiRequest::post("/me/change-password").json(&ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        self.send(request).await
    }

    // Chats

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        self.send(ApiRequest::get("/chats")).await
    }

    /// Create a chat and return its id
    pub async fn create_chat(&self, title: &str) -> Result<i64, ClientError> {
        let title = match title.trim() {
            "" => DEFAULT_CHAT_TITLE,
            title => title,
        };
        let request = ApiRequest::post("/chats").form(FormPayload::new().text("title", title));
        let response: CreateChatResponse = self.send(request).await?;
        debug!("Created chat {} ({title})", response.chat_id);
        Ok(response.chat_id)
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>, ClientError> {
        self.send(ApiRequest::get(format!("/chats/{chat_id}/messages")))
            .await
    }

    /// Send a message to a chat and return the assistant's reply
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<SendMessageResponse, ClientError> {
        message.validate()?;
        let request =
            ApiRequest::post(format!("/chats/{chat_id}/messages")).form(message.to_form());
        self.send(request).await
    }

    /// Send to the user's default chat, creating it server-side if needed
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn send_default_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<SendMessageResponse, ClientError> {
        message.validate()?;
        let request = ApiRequest::post("/chats/default/message").form(message.to_form());
        self.send(request).await
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn default_history(&self) -> Result<Vec<ChatMessage>, ClientError> {
        self.send(ApiRequest::get("/chats/default/history")).await
    }

    /// Chat that collects recognition requests
    ///
    /// Picks the first chat whose title mentions recognition, creating one when
    /// none exists, and falls back to the first chat if creation fails.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn recognition_chat(&self) -> Result<i64, ClientError> {
        let chats = self.list_chats().await?;
        if let Some(chat) = find_recognition_chat(&chats) {
            return Ok(chat.id);
        }

        match self.create_chat(RECOGNITION_CHAT_TITLE).await {
            Ok(chat_id) => Ok(chat_id),
            Err(e) => {
                debug!("Could not create recognition chat: {e}");
                chats.first().map(|chat| chat.id).ok_or(e)
            }
        }
    }

    /// Submit a photo for recognition and return the assistant's analysis
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn recognize(
        &self,
        request: RecognitionRequest,
    ) -> Result<SendMessageResponse, ClientError> {
        let message = request.into_message()?;
        let chat_id = self.recognition_chat().await?;
        self.send_message(chat_id, &message).await
    }

    // Points

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn list_points(&self) -> Result<Vec<Point>, ClientError> {
        self.send(ApiRequest::get("/points")).await
    }

    /// Points ordered by distance from `origin`
    pub async fn nearest_points(
        &self,
        origin: Coordinates,
        limit: usize,
    ) -> Result<Vec<NearestPoint>, ClientError> {
        let path = format!(
            "/points/nearest?lat={}&lon={}&k={limit}",
            origin.lat, origin.lon
        );
        self.send(ApiRequest::get(path)).await
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn map_config(&self) -> Result<MapConfig, ClientError> {
        self.send(ApiRequest::get("/points/map-config")).await
    }

    // Contact and legal

    /// Message the team; returns the `WhatsApp` link when the server has one
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn contact(
        &self,
        email: Option<&str>,
        message: &str,
    ) -> Result<Option<String>, ClientError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::Validation("Write a message.".to_string()));
        }
        let request = ApiRequest::post("/contact").public().json(&ContactRequest {
            email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            message: message.to_string(),
        })?;
        let response: ContactResponse = self.send(request).await?;
        Ok(response.whatsapp)
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn terms(&self) -> Result<LegalDocument, ClientError> {
        self.send(ApiRequest::get("/legal/terms").public()).await
    }

    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or the server rejects it.
    pub async fn privacy(&self) -> Result<LegalDocument, ClientError> {
        self.send(ApiRequest::get("/legal/privacy").public()).await
    }
}

fn find_recognition_chat(chats: &[ChatSummary]) -> Option<&ChatSummary> {
    let needle = RECOGNITION_CHAT_TITLE.to_lowercase();
    chats
        .iter()
        .find(|chat| chat.title.to_lowercase().contains(&needle))
}
