use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::User,
    store::ForumStore,
};

pub async fn create_user(store: &dyn ForumStore, username: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::InvalidInput("Username cannot be empty".to_string()));
    }

    let mut tx = store.begin().await?;

    if tx.find_user_by_username(username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let user = User::new(username.to_string());
    tx.insert_user(&user).await?;
    tx.commit().await?;

    tracing::info!("User {} registered as {}", user.id, user.username);

    Ok(user)
}

pub async fn get_user(store: &dyn ForumStore, user_id: Uuid) -> Result<User> {
    let mut tx = store.begin().await?;
    tx.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
