use super::{ProviderError, ProviderResponse, PushMessage, PushProvider};
use crate::config::FcmConfig;
use crate::services::metrics::record_gateway_call;
use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedRequestExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Firebase Cloud Messaging over the legacy HTTP API: server-key auth,
/// `/fcm/send` for delivery and the Instance ID API for topic registration.
pub struct FcmLegacyProvider {
    config: FcmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    to: String,
    notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    data: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResponse {
    /// Present on topic sends; numeric on the wire.
    #[serde(default)]
    message_id: Option<serde_json::Value>,
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

impl FcmResponse {
    fn into_result(self) -> Result<ProviderResponse, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::SendFailed(format!("FCM error: {}", error)));
        }

        if self.failure > 0 {
            let reason = self
                .results
                .iter()
                .find_map(|r| r.error.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ProviderError::SendFailed(format!("FCM error: {}", reason)));
        }

        let provider_id = match self.message_id {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(other) => Some(other.to_string()),
            None => self.results.into_iter().find_map(|r| r.message_id),
        };

        Ok(ProviderResponse::success(provider_id))
    }
}

impl FcmLegacyProvider {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn authorization(&self) -> String {
        format!("key={}", self.config.server_key.expose_secret())
    }

    fn topic_url(&self, token: &str, topic: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.iid_url)
            .map_err(|e| ProviderError::Configuration(format!("Invalid FCM IID URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Configuration("FCM IID URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", token, "rel", "topics", topic]);
        Ok(url)
    }
}

#[async_trait]
impl PushProvider for FcmLegacyProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "FCM push provider is not enabled".to_string(),
            ));
        }

        let request = FcmRequest {
            to: push.to.address(),
            notification: FcmNotification {
                title: &push.title,
                body: &push.body,
                icon: push.icon.as_deref(),
            },
            data: &push.data,
        };

        let response = self
            .client
            .post(&self.config.send_url)
            .header("Authorization", self.authorization())
            .json(&request)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                record_gateway_call("send", "error");
                ProviderError::Connection(format!("Failed to connect to FCM: {}", e))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            record_gateway_call("send", "unauthorized");
            return Err(ProviderError::Authentication(
                "FCM rejected the server key".to_string(),
            ));
        }
        if !status.is_success() {
            record_gateway_call("send", "error");
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "FCM API returned error status {}: {}",
                status, body
            )));
        }

        let fcm_response: FcmResponse = response.json().await.map_err(|e| {
            record_gateway_call("send", "error");
            ProviderError::SendFailed(format!("Failed to parse FCM response: {}", e))
        })?;

        let result = fcm_response.into_result();
        record_gateway_call("send", if result.is_ok() { "ok" } else { "error" });

        if result.is_ok() {
            tracing::info!(to = %push.to.address(), "Push notification sent via FCM");
        }
        result
    }

    async fn subscribe_to_topic(&self, token: &str, topic: &str) -> Result<(), ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "FCM push provider is not enabled".to_string(),
            ));
        }

        let url = self.topic_url(token, topic)?;
        let response = self
            .client
            .post(url)
            .header("Authorization", self.authorization())
            .header("Content-Length", "0")
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                record_gateway_call("subscribe", "error");
                ProviderError::Connection(format!("Failed to connect to FCM: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            record_gateway_call("subscribe", "error");
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "FCM topic registration returned status {}: {}",
                status, body
            )));
        }

        record_gateway_call("subscribe", "ok");
        tracing::info!(topic = %topic, "Device token subscribed to topic");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.enabled && self.config.server_key.expose_secret().is_empty() {
            return Err(ProviderError::Configuration(
                "FCM server key is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock push provider for testing
pub struct MockPushProvider {
    enabled: bool,
    send_count: AtomicU64,
    subscribe_count: AtomicU64,
    failing_tokens: HashSet<String>,
    sent: Mutex<Vec<PushMessage>>,
}

impl MockPushProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
            subscribe_count: AtomicU64::new(0),
            failing_tokens: HashSet::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make sends addressed to these device tokens fail.
    pub fn failing_on<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.failing_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> u64 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    pub async fn sent_messages(&self) -> Vec<PushMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock push provider is not enabled".to_string(),
            ));
        }

        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().await.push(push.clone());

        if self.failing_tokens.contains(&push.to.address()) {
            return Err(ProviderError::SendFailed(format!(
                "[MOCK] delivery to {} failed",
                push.to.address()
            )));
        }

        tracing::info!(
            to = %push.to.address(),
            title = %push.title,
            "[MOCK] Push notification would be sent"
        );

        Ok(ProviderResponse::success(Some(format!("mock-push-{}", count))))
    }

    async fn subscribe_to_topic(&self, token: &str, topic: &str) -> Result<(), ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock push provider is not enabled".to_string(),
            ));
        }

        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(token = %token, topic = %topic, "[MOCK] Token would be subscribed");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
