use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

use crate::services::AllowedOrigin;
use crate::startup::AppState;

/// JSON body that has passed `validator` checks. Both parse and validation
/// failures are rejected with 400.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// The caller's `Origin`, admitted by the configured origin policy.
///
/// Extracted from the request head, so handlers that take it before the body
/// reject a foreign origin with 403 without looking at the payload.
#[async_trait]
impl FromRequestParts<AppState> for AllowedOrigin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let origin = parts
            .headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        state.origin_policy.admit(origin).ok_or_else(|| {
            tracing::warn!(origin = %origin, "Rejected request from disallowed origin");
            AppError::Forbidden(anyhow::anyhow!("Invalid origin"))
        })
    }
}
