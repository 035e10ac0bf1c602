pub mod push;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;
use thiserror::Error;

pub use push::{FcmLegacyProvider, MockPushProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::UpstreamError(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
            message: None,
        }
    }
}

/// Where a push goes: one device, or everyone subscribed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushTarget {
    Token(String),
    Topic(String),
}

impl PushTarget {
    /// Address in the gateway's `to` field.
    pub fn address(&self) -> String {
        match self {
            PushTarget::Token(token) => token.clone(),
            PushTarget::Topic(topic) => format!("/topics/{}", topic),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushMessage {
    pub to: PushTarget,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub data: HashMap<String, String>,
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError>;
    /// Register a device token under a broadcast topic.
    async fn subscribe_to_topic(&self, token: &str, topic: &str) -> Result<(), ProviderError>;
    async fn health_check(&self) -> Result<(), ProviderError>;
    fn is_enabled(&self) -> bool;
}
