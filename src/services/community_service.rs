use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Community, CreateCommunityRequest, User},
    services::score_service,
    store::{ForumStore, Page},
};

/// Creates the community and makes its creator the first member.
pub async fn create_community(
    store: &dyn ForumStore,
    creator_id: Uuid,
    payload: CreateCommunityRequest,
) -> Result<Community> {
    let mut tx = store.begin().await?;

    if tx.get_user(creator_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    // Check if community name already exists
    if tx.find_community_by_name(&payload.name).await?.is_some() {
        return Err(AppError::Conflict(
            "Community name already exists".to_string(),
        ));
    }

    let now = Utc::now();
    let display_name = payload
        .display_name
        .unwrap_or_else(|| format!("r/{}", payload.name));
    let mut community = Community {
        id: Uuid::new_v4(),
        name: payload.name,
        display_name,
        description: payload.description,
        member_count: 0,
        created_by: creator_id,
        created_at: now,
        updated_at: now,
    };

    tx.insert_community(&community).await?;
    tx.add_member(community.id, creator_id).await?;
    community.member_count =
        score_service::recompute_member_count(tx.as_mut(), community.id).await?;
    tx.commit().await?;

    tracing::info!(
        "Community {} ({}) created by {}",
        community.name,
        community.id,
        creator_id
    );

    Ok(community)
}

pub async fn get_community(store: &dyn ForumStore, community_id: Uuid) -> Result<Community> {
    let mut tx = store.begin().await?;
    tx.get_community(community_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".to_string()))
}

pub async fn get_community_by_name(store: &dyn ForumStore, name: &str) -> Result<Community> {
    let mut tx = store.begin().await?;
    tx.find_community_by_name(name)
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".to_string()))
}

/// Matches name, display name or description, largest communities first.
pub async fn search_communities(
    store: &dyn ForumStore,
    query: &str,
    page: u32,
    size: u32,
) -> Result<Vec<Community>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidInput(
            "Search query cannot be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    tx.search_communities(query, Page::new(page, size)).await
}

pub async fn get_members(
    store: &dyn ForumStore,
    community_id: Uuid,
    page: u32,
    size: u32,
) -> Result<Vec<User>> {
    let mut tx = store.begin().await?;
    if tx.get_community(community_id).await?.is_none() {
        return Err(AppError::NotFound("Community not found".to_string()));
    }
    tx.list_members(community_id, Page::new(page, size)).await
}

pub async fn get_members_by_name(
    store: &dyn ForumStore,
    name: &str,
    page: u32,
    size: u32,
) -> Result<Vec<User>> {
    let mut tx = store.begin().await?;
    let community = tx
        .find_community_by_name(name)
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".to_string()))?;
    tx.list_members(community.id, Page::new(page, size)).await
}

/// Joining twice is a no-op. Returns the refreshed community.
pub async fn join_community(
    store: &dyn ForumStore,
    community_id: Uuid,
    user_id: Uuid,
) -> Result<Community> {
    update_membership(store, community_id, user_id, true).await
}

/// Leaving a community the user is not in is a no-op.
pub async fn leave_community(
    store: &dyn ForumStore,
    community_id: Uuid,
    user_id: Uuid,
) -> Result<Community> {
    update_membership(store, community_id, user_id, false).await
}

async fn update_membership(
    store: &dyn ForumStore,
    community_id: Uuid,
    user_id: Uuid,
    join: bool,
) -> Result<Community> {
    let mut tx = store.begin().await?;

    if tx.get_community(community_id).await?.is_none() {
        return Err(AppError::NotFound("Community not found".to_string()));
    }
    if tx.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let changed = if join {
        tx.add_member(community_id, user_id).await?
    } else {
        tx.remove_member(community_id, user_id).await?
    };
    score_service::recompute_member_count(tx.as_mut(), community_id).await?;

    let community = tx
        .get_community(community_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".to_string()))?;
    tx.commit().await?;

    tracing::debug!(
        "User {} {} community {} (changed: {}, members: {})",
        user_id,
        if join { "joined" } else { "left" },
        community_id,
        changed,
        community.member_count
    );

    Ok(community)
}

pub async fn popular_communities(
    store: &dyn ForumStore,
    page: u32,
    size: u32,
) -> Result<Vec<Community>> {
    let mut tx = store.begin().await?;
    tx.list_communities_by_members(Page::new(page, size)).await
}
