//! HTTP client for the Katara recycling assistant
//!
//! Authenticated requests, credential storage, typed endpoints and the wire
//! types they exchange.

pub mod client;
pub mod types;

pub use client::{ClientError, Gateway, KataraClient, Session};
