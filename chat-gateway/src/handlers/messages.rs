use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use super::extract::ValidatedJson;
use crate::models::{DataResponse, Group, Message, MessageFilter, NewMessage};
use crate::services::{notify_group, record_message_created};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_target"))]
pub struct CreateMessageRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "sender is required"))]
    pub sender: String,
    #[serde(rename = "groupId")]
    pub group_id: Option<String>,
    pub receiver: Option<String>,
}

fn validate_target(request: &CreateMessageRequest) -> Result<(), ValidationError> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    if present(&request.group_id) || present(&request.receiver) {
        Ok(())
    } else {
        let mut err = ValidationError::new("missing_target");
        err.message = Some("groupId or receiver is required".into());
        Err(err)
    }
}

impl CreateMessageRequest {
    /// A non-empty `groupId` makes this a group message.
    fn into_new_message(self) -> NewMessage {
        match self.group_id.filter(|g| !g.is_empty()) {
            Some(group_id) => NewMessage::to_group(self.message, self.sender, group_id),
            None => NewMessage::to_receiver(
                self.message,
                self.sender,
                self.receiver.unwrap_or_default(),
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "groupId")]
    pub group_id: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    #[serde(rename = "lastId")]
    pub last_id: Option<String>,
}

impl ListQuery {
    fn lists_groups(&self) -> bool {
        self.kind.as_deref() == Some("groups")
    }

    fn into_filter(self) -> Result<MessageFilter, AppError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let after_id = match non_empty(self.last_id) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("lastId must be an integer, got '{}'", raw))
            })?),
            None => None,
        };

        match (
            non_empty(self.group_id),
            non_empty(self.sender),
            non_empty(self.receiver),
        ) {
            (Some(group_id), _, _) => Ok(MessageFilter::Group { group_id, after_id }),
            (None, Some(sender), Some(receiver)) => Ok(MessageFilter::Conversation {
                sender,
                receiver,
                after_id,
            }),
            _ => Err(AppError::BadRequest(anyhow::anyhow!(
                "groupId, or sender and receiver, are required"
            ))),
        }
    }
}

/// Store a message and, for group messages, notify the group's members.
///
/// The push fan-out completes before the response but never changes it.
#[tracing::instrument(skip(state, request))]
pub async fn create_message(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateMessageRequest>,
) -> Result<Json<DataResponse<Vec<Message>>>, AppError> {
    let new_message = request.into_new_message();
    let message = state.stores.messages.insert(&new_message).await?;

    let kind = message.kind();
    record_message_created(&kind.to_string());
    tracing::info!(message_id = message.id, kind = %kind, "Message stored");

    if let Some(group_id) = &message.group_id {
        let gateway = &state.config.gateway;
        if let Err(e) = notify_group(
            &state.stores,
            state.push_provider.as_ref(),
            group_id,
            &message,
            Some(gateway.icon_url.clone()),
            gateway.fanout_concurrency,
        )
        .await
        {
            tracing::warn!(group_id = %group_id, error = %e, "Skipping notification fan-out");
        }
    }

    Ok(Json(DataResponse::new(vec![message])))
}

pub enum ListResponse {
    Groups(Vec<Group>),
    Messages(Vec<Message>),
}

impl axum::response::IntoResponse for ListResponse {
    fn into_response(self) -> axum::response::Response {
        match self {
            ListResponse::Groups(groups) => Json(DataResponse::new(groups)).into_response(),
            ListResponse::Messages(messages) => Json(DataResponse::new(messages)).into_response(),
        }
    }
}

/// `GET /api`: every group with `type=groups`, otherwise the messages of a
/// group or conversation in creation order.
#[tracing::instrument(skip(state))]
pub async fn get_api(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, AppError> {
    if query.lists_groups() {
        let groups = state.stores.groups.list_groups().await?;
        return Ok(ListResponse::Groups(groups));
    }

    let filter = query.into_filter()?;
    let messages = state.stores.messages.list(&filter).await?;
    tracing::debug!(count = messages.len(), "Messages listed");
    Ok(ListResponse::Messages(messages))
}
