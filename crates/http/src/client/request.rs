//! Outbound request descriptors and body encoding

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::Serialize;

use super::error::ClientError;

/// Request body as the caller describes it
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Structured value, serialized to JSON on send
    Json(serde_json::Value),
    /// Pre-serialized text, sent verbatim
    Text(String),
    /// Multipart form, sent with the transport's own boundary
    Form(FormPayload),
}

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

/// Multipart payload that can be rebuilt for every attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPayload {
    fields: Vec<FormField>,
}

impl FormPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a file field
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.fields.push(FormField::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a fresh transport form
    ///
    /// # Errors
    ///
    /// Returns an error if a file part carries an invalid MIME type.
    pub fn to_multipart(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for field in &self.fields {
            form = match field {
                FormField::Text { name, value } => form.text(name.clone(), value.clone()),
                FormField::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let part = Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Description of one API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    /// Attach the stored access token
    pub auth: bool,
    pub headers: HeaderMap,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            auth: true,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Serialize `value` as the JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Send `text` as-is
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    /// Send a multipart form
    #[must_use]
    pub fn form(mut self, form: FormPayload) -> Self {
        self.body = RequestBody::Form(form);
        self
    }

    /// Do not attach credentials
    #[must_use]
    pub fn public(mut self) -> Self {
        self.auth = false;
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Build the transport request for one attempt
    ///
    /// `access_token` is attached only when the descriptor asks for auth and
    /// the token is non-empty.
    pub(crate) fn build(
        &self,
        client: &Client,
        base_url: &str,
        access_token: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = format!("{base_url}{}", self.path);
        let mut headers = self.headers.clone();

        if self.auth
            && let Some(token) = access_token.filter(|token| !token.is_empty())
        {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClientError::Configuration(format!("invalid access token: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let request = client.request(self.method.clone(), url);
        let request = match &self.body {
            RequestBody::Empty => request.headers(headers),
            RequestBody::Json(value) => {
                if !headers.contains_key(header::CONTENT_TYPE) {
                    headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                }
                request.headers(headers).body(serde_json::to_vec(value)?)
            }
            RequestBody::Text(text) => request.headers(headers).body(text.clone()),
            RequestBody::Form(form) => request.headers(headers).multipart(form.to_multipart()?),
        };

        Ok(request)
    }
}
