use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use service_core::observability::TracedRequestExt;

use super::{GroupStore, MessageStore, StoreError, StoreHealth, TokenStore, UserStore};
use crate::models::{Group, Message, MessageFilter, NewMessage, User, UserToken};

const MESSAGES: &str = "messages";
const USERS: &str = "users";
const GROUPS: &str = "groups";
const GROUP_MEMBERS: &str = "group_members";
const USER_TOKENS: &str = "user_tokens";

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// Client for a PostgREST endpoint (`<database url>/rest/v1/<table>`),
/// authenticated with the project's anonymous key.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    rest_url: String,
    api_key: Secret<String>,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    user_id: i64,
}

impl PostgrestStore {
    pub fn new(database_url: &str, api_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            rest_url: format!("{}/rest/v1", database_url.trim_end_matches('/')),
            api_key,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", key)
            .bearer_auth(key)
            .with_trace_context()
    }

    async fn send(builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "Database request failed");
            StoreError::Connection(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = backend_error(status.as_u16(), &body);
        tracing::error!(status = status.as_u16(), error = %err, "Database returned an error");
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, StoreError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn fetch_one<T: DeserializeOwned>(
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, StoreError> {
        Self::fetch::<Vec<T>>(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("no {} returned", what)))
    }
}

fn backend_error(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(PostgrestError {
            code,
            message: Some(message),
        }) => StoreError::Backend {
            status,
            code,
            message,
        },
        _ => StoreError::Backend {
            status,
            code: None,
            message: if body.is_empty() {
                format!("database returned status {}", status)
            } else {
                body.to_string()
            },
        },
    }
}

/// Quote a value for use inside a PostgREST logic tree (`or=(...)`).
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Query parameters for a message filter, including ordering.
pub(crate) fn message_query(filter: &MessageFilter) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    match filter {
        MessageFilter::Group { group_id, .. } => {
            params.push(("group_id".to_string(), format!("eq.{}", group_id)));
        }
        MessageFilter::Conversation {
            sender, receiver, ..
        } => {
            let (s, r) = (quote(sender), quote(receiver));
            params.push((
                "or".to_string(),
                format!(
                    "(and(sender.eq.{s},receiver.eq.{r}),and(sender.eq.{r},receiver.eq.{s}))"
                ),
            ));
        }
    }

    if let Some(after) = filter.after_id() {
        params.push(("id".to_string(), format!("gt.{}", after)));
    }

    params.push(("order".to_string(), "created_at.asc,id.asc".to_string()));
    params
}

fn in_list(ids: &[i64]) -> String {
    let joined = ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", joined)
}

#[async_trait]
impl MessageStore for PostgrestStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let builder = self
            .request(Method::POST, MESSAGES)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[message]);
        Self::fetch_one(builder, "message").await
    }

    async fn list(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError> {
        let builder = self
            .request(Method::GET, MESSAGES)
            .query(&message_query(filter));
        Self::fetch(builder).await
    }

    async fn reassign_sender(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let builder = self
            .request(Method::PATCH, MESSAGES)
            .query(&[("sender", format!("eq.{}", from)), ("select", "id".to_string())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&json!({ "sender": to }));
        let rows: Vec<serde_json::Value> = Self::fetch(builder).await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl UserStore for PostgrestStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let builder = self.request(Method::GET, USERS).query(&[
            ("select", "*".to_string()),
            ("username", format!("eq.{}", username)),
            ("limit", "1".to_string()),
        ]);
        let users: Vec<User> = Self::fetch(builder).await?;
        Ok(users.into_iter().next())
    }

    async fn create(&self, username: &str) -> Result<User, StoreError> {
        let builder = self
            .request(Method::POST, USERS)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[json!({ "username": username })]);
        Self::fetch_one(builder, "user").await
    }

    async fn rename(&self, id: i64, username: &str) -> Result<User, StoreError> {
        let builder = self
            .request(Method::PATCH, USERS)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&json!({ "username": username }));
        Self::fetch_one(builder, "user").await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let builder = self
            .request(Method::DELETE, USERS)
            .query(&[("id", format!("eq.{}", id))]);
        Self::send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl GroupStore for PostgrestStore {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let builder = self
            .request(Method::GET, GROUPS)
            .query(&[("select", "*")]);
        Self::fetch(builder).await
    }

    async fn member_ids(&self, group_id: &str) -> Result<Vec<i64>, StoreError> {
        let builder = self.request(Method::GET, GROUP_MEMBERS).query(&[
            ("select", "user_id".to_string()),
            ("group_id", format!("eq.{}", group_id)),
        ]);
        let rows: Vec<MemberRow> = Self::fetch(builder).await?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }
}

#[async_trait]
impl TokenStore for PostgrestStore {
    async fn upsert(&self, user_id: i64, token: &str) -> Result<UserToken, StoreError> {
        let builder = self
            .request(Method::POST, USER_TOKENS)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(&[UserToken {
                user_id,
                token: token.to_string(),
            }]);
        Self::fetch_one(builder, "user token").await
    }

    async fn tokens_for(&self, user_ids: &[i64]) -> Result<Vec<UserToken>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let builder = self.request(Method::GET, USER_TOKENS).query(&[
            ("select", "user_id,token".to_string()),
            ("user_id", in_list(user_ids)),
        ]);
        Self::fetch(builder).await
    }
}

#[async_trait]
impl StoreHealth for PostgrestStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        let builder = self
            .request(Method::GET, GROUPS)
            .query(&[("select", "id"), ("limit", "1")]);
        Self::send(builder).await.map(|_| ())
    }
}
