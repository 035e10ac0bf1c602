use super::store::{MessageStore, StoreError, UserStore};
use crate::models::{MergeStrategy, User};

/// Return the user called `username`, creating it on first use.
///
/// A concurrent login may create the same user between the lookup and the
/// insert; the unique-name conflict is resolved by reading the row back.
pub async fn find_or_create(users: &dyn UserStore, username: &str) -> Result<User, StoreError> {
    if let Some(user) = users.find_by_username(username).await? {
        return Ok(user);
    }

    match users.create(username).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %username, "User created");
            Ok(user)
        }
        Err(e) if e.is_conflict() => {
            tracing::debug!(username = %username, "User created concurrently, reading it back");
            users.find_by_username(username).await?.ok_or(e)
        }
        Err(e) => Err(e),
    }
}

/// Log in as `username`, folding `old_username` into it when that account
/// exists.
///
/// Lookups and creation of the target user propagate their errors. The merge
/// steps themselves are best effort: a failure is logged and the target user
/// is still returned.
pub async fn login_or_merge(
    users: &dyn UserStore,
    messages: &dyn MessageStore,
    username: &str,
    old_username: Option<&str>,
    strategy: MergeStrategy,
) -> Result<User, StoreError> {
    let old_username = match old_username.filter(|old| !old.is_empty() && *old != username) {
        Some(old) => old,
        None => return find_or_create(users, username).await,
    };

    let old_user = match users.find_by_username(old_username).await? {
        Some(user) => user,
        None => return find_or_create(users, username).await,
    };

    match strategy {
        MergeStrategy::Transfer => transfer(users, messages, old_user, username).await,
        MergeStrategy::Rename => rename(users, old_user, username).await,
    }
}

async fn transfer(
    users: &dyn UserStore,
    messages: &dyn MessageStore,
    old_user: User,
    username: &str,
) -> Result<User, StoreError> {
    let user = find_or_create(users, username).await?;

    match messages.reassign_sender(&old_user.username, username).await {
        Ok(moved) => {
            tracing::info!(
                from = %old_user.username,
                to = %username,
                messages = moved,
                "Message authorship transferred"
            );
            if let Err(e) = users.delete(old_user.id).await {
                tracing::error!(user_id = old_user.id, error = %e, "Failed to delete merged user");
            }
        }
        Err(e) => {
            // Keep the old account so its messages stay attributable.
            tracing::error!(
                from = %old_user.username,
                to = %username,
                error = %e,
                "Failed to transfer message authorship"
            );
        }
    }

    Ok(user)
}

async fn rename(users: &dyn UserStore, old_user: User, username: &str) -> Result<User, StoreError> {
    if let Some(existing) = users.find_by_username(username).await? {
        tracing::warn!(
            from = %old_user.username,
            to = %username,
            "Username already taken, keeping both accounts"
        );
        return Ok(existing);
    }

    match users.rename(old_user.id, username).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, from = %old_user.username, to = %username, "User renamed");
            Ok(user)
        }
        Err(e) => {
            tracing::error!(user_id = old_user.id, error = %e, "Failed to rename user");
            find_or_create(users, username).await
        }
    }
}
