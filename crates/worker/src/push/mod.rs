//! Outbound push delivery.
//!
//! The dispatcher only sees [`PushGateway`]; [`web_push::WebPushGateway`] is
//! the production implementation.

pub mod web_push;

use async_trait::async_trait;
use notice_core::credentials::PushCredentials;
use thiserror::Error;

pub use web_push::WebPushGateway;

#[derive(Debug, Clone, Copy)]
pub struct PushTarget<'a> {
    pub endpoint: &'a str,
    pub p256dh: &'a str,
    pub auth: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct PushOptions<'a> {
    pub credentials: &'a PushCredentials,
    pub subject: &'a str,
    pub ttl_secs: u32,
}

/// Status returned by the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushResponse {
    pub status: u16,
}

impl PushResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The subscription no longer exists and will never accept messages.
    pub fn is_gone(&self) -> bool {
        matches!(self.status, 404 | 410)
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid subscription keys: {0}")]
    InvalidKeys(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("vapid signing failed: {0}")]
    Signing(String),
    #[error("payload encryption failed")]
    Encryption,
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(
        &self,
        payload: &[u8],
        target: &PushTarget<'_>,
        options: &PushOptions<'_>,
    ) -> Result<PushResponse, PushError>;
}
