use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;
use validator::Validate;

use super::extract::ValidatedJson;
use crate::models::DataResponse;
use crate::services::{AllowedOrigin, ProviderResponse, PushMessage, PushTarget};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SendNotificationRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "message_subject is required"))]
    pub message_subject: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "message_body is required"))]
    pub message_body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Subscription {
    pub topic: String,
    pub token: String,
}

/// `POST /send`: broadcast to everyone subscribed to the caller's topic.
#[tracing::instrument(skip(state, request), fields(topic = %origin.topic))]
pub async fn send_notification(
    State(state): State<AppState>,
    origin: AllowedOrigin,
    ValidatedJson(request): ValidatedJson<SendNotificationRequest>,
) -> Result<Json<DataResponse<ProviderResponse>>, AppError> {
    let mut data = HashMap::new();
    data.insert("origin".to_string(), origin.origin.clone());
    data.insert("subject".to_string(), request.message_subject.clone());

    let push = PushMessage {
        to: PushTarget::Topic(origin.topic.clone()),
        title: request.message_subject,
        body: request.message_body,
        icon: Some(state.config.gateway.icon_url.clone()),
        data,
    };

    let response = state.push_provider.send(&push).await.map_err(|e| {
        tracing::error!(error = %e, "Topic broadcast failed");
        AppError::from(e)
    })?;

    Ok(Json(DataResponse::new(response)))
}

/// `POST /subscribe`: remember the user's device token, then register it
/// under the caller's topic.
#[tracing::instrument(skip(state, request), fields(topic = %origin.topic))]
pub async fn subscribe(
    State(state): State<AppState>,
    origin: AllowedOrigin,
    ValidatedJson(request): ValidatedJson<SubscribeRequest>,
) -> Result<Json<DataResponse<Subscription>>, AppError> {
    if let Some(user_id) = request.user_id {
        state.stores.tokens.upsert(user_id, &request.token).await?;
        tracing::info!(user_id, "Device token stored");
    }

    state
        .push_provider
        .subscribe_to_topic(&request.token, &origin.topic)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Topic subscription failed");
            AppError::from(e)
        })?;

    Ok(Json(DataResponse::new(Subscription {
        topic: origin.topic,
        token: request.token,
    })))
}
