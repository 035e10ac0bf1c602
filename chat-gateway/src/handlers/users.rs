use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use super::extract::ValidatedJson;
use crate::models::User;
use crate::services::accounts;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertUserRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(rename = "oldUsername")]
    pub old_username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// `PUT /api`: log in as `username`, creating it on first use and folding in
/// `oldUsername` according to the configured merge strategy.
#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn upsert_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<UpsertUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = accounts::login_or_merge(
        state.stores.users.as_ref(),
        state.stores.messages.as_ref(),
        &request.username,
        request.old_username.as_deref(),
        state.config.gateway.merge_strategy,
    )
    .await?;

    Ok(Json(UserResponse { user }))
}
