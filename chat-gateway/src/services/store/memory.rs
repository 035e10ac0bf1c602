use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{GroupStore, MessageStore, StoreError, StoreHealth, TokenStore, UserStore};
use crate::models::{Group, GroupMember, Message, MessageFilter, NewMessage, User, UserToken};

/// In-process store with the same ordering, cursor and uniqueness rules as
/// the hosted backend. Used in tests and when no database URL is configured.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    messages: Vec<Message>,
    users: BTreeMap<i64, User>,
    groups: Vec<Group>,
    members: Vec<GroupMember>,
    tokens: BTreeMap<i64, String>,
    last_message_id: i64,
    last_user_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_group(&self, group: Group) {
        self.state.write().await.groups.push(group);
    }

    pub async fn add_member(&self, group_id: &str, user_id: i64) {
        self.state.write().await.members.push(GroupMember {
            group_id: group_id.to_string(),
            user_id,
        });
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn token_for(&self, user_id: i64) -> Option<String> {
        self.state.read().await.tokens.get(&user_id).cloned()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let mut state = self.state.write().await;
        state.last_message_id += 1;

        let row = Message {
            id: state.last_message_id,
            message: message.message.clone(),
            sender: message.sender.clone(),
            group_id: message.group_id.clone(),
            receiver: message.receiver.clone(),
            created_at: Utc::now(),
        };
        state.messages.push(row.clone());
        Ok(row)
    }

    async fn list(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn reassign_sender(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut touched = 0;
        for message in state.messages.iter_mut().filter(|m| m.sender == from) {
            message.sender = to.to_string();
            touched += 1;
        }
        Ok(touched)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, username: &str) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                username
            )));
        }

        state.last_user_id += 1;
        let user = User {
            id: state.last_user_id,
            username: username.to_string(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn rename(&self, id: i64, username: &str) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.username == username && u.id != id)
        {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                username
            )));
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {} not found", id)))?;
        user.username = username.to_string();
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.state.read().await.groups.clone())
    }

    async fn member_ids(&self, group_id: &str) -> Result<Vec<i64>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .map(|m| m.user_id)
            .collect())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn upsert(&self, user_id: i64, token: &str) -> Result<UserToken, StoreError> {
        self.state
            .write()
            .await
            .tokens
            .insert(user_id, token.to_string());
        Ok(UserToken {
            user_id,
            token: token.to_string(),
        })
    }

    async fn tokens_for(&self, user_ids: &[i64]) -> Result<Vec<UserToken>, StoreError> {
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                state.tokens.get(id).map(|token| UserToken {
                    user_id: *id,
                    token: token.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
