//! Data access for messages, users, groups and device tokens.
//!
//! Handlers only talk to these traits. `PostgrestStore` speaks to the hosted
//! database over its REST API; `MemoryStore` keeps everything in process.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Group, Message, MessageFilter, NewMessage, User, UserToken};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend answered with an error; `message` is its own wording.
    #[error("{message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

impl StoreError {
    /// A unique constraint rejected the write.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict(_) | StoreError::Backend { status: 409, .. }
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseError(anyhow::anyhow!(err.to_string()))
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &NewMessage) -> Result<Message, StoreError>;
    /// Matching rows in ascending creation order.
    async fn list(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError>;
    /// Re-attribute every message sent by `from` to `to`. Returns rows touched.
    async fn reassign_sender(&self, from: &str, to: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, username: &str) -> Result<User, StoreError>;
    async fn rename(&self, id: i64, username: &str) -> Result<User, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;
    async fn member_ids(&self, group_id: &str) -> Result<Vec<i64>, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn upsert(&self, user_id: i64, token: &str) -> Result<UserToken, StoreError>;
    async fn tokens_for(&self, user_ids: &[i64]) -> Result<Vec<UserToken>, StoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// The set of stores a request handler can reach.
#[derive(Clone)]
pub struct Stores {
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    /// Use one backend for every entity.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: MessageStore + UserStore + GroupStore + TokenStore + StoreHealth + 'static,
    {
        Self {
            messages: backend.clone(),
            users: backend.clone(),
            groups: backend.clone(),
            tokens: backend.clone(),
            health: backend,
        }
    }
}
