use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        CreatePostRequest, DeleteSummary, Post, PostSort, PostType, TargetKind, UpdatePostRequest,
    },
    services::comment_service,
    store::{ForumStore, Page},
};

/// Each post type needs its own payload field.
fn check_content(
    post_type: PostType,
    content: Option<&str>,
    url: Option<&str>,
    image_url: Option<&str>,
) -> Result<()> {
    match post_type {
        PostType::Text => {
            if content.is_none_or(|c| c.trim().is_empty()) {
                return Err(AppError::InvalidInput(
                    "Text posts must have content".to_string(),
                ));
            }
        }
        PostType::Link => {
            if url.is_none() {
                return Err(AppError::InvalidInput(
                    "Link posts must have a URL".to_string(),
                ));
            }
        }
        PostType::Image => {
            if image_url.is_none() {
                return Err(AppError::InvalidInput(
                    "Image posts must have an image URL".to_string(),
                ));
            }
        }
    }
    Ok(())
}

pub async fn create_post(
    store: &dyn ForumStore,
    author_id: Uuid,
    community_id: Uuid,
    payload: CreatePostRequest,
) -> Result<Post> {
    let post_type = payload.post_type.unwrap_or(if payload.image_url.is_some() {
        PostType::Image
    } else if payload.url.is_some() {
        PostType::Link
    } else {
        PostType::Text
    });

    check_content(
        post_type,
        payload.content.as_deref(),
        payload.url.as_deref(),
        payload.image_url.as_deref(),
    )?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
    }

    let mut tx = store.begin().await?;

    if tx.get_user(author_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    if tx.get_community(community_id).await?.is_none() {
        return Err(AppError::NotFound("Community not found".to_string()));
    }

    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: payload.content,
        url: payload.url,
        image_url: payload.image_url,
        post_type,
        author_id,
        community_id,
        upvotes: 0,
        downvotes: 0,
        score: 0,
        comment_count: 0,
        created_at: now,
        updated_at: now,
    };

    tx.insert_post(&post).await?;
    tx.commit().await?;

    tracing::info!(
        "Post {} created in community {} by {}",
        post.id,
        community_id,
        author_id
    );

    Ok(post)
}

pub async fn get_post(store: &dyn ForumStore, post_id: Uuid) -> Result<Post> {
    let mut tx = store.begin().await?;
    tx.get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn list_posts(
    store: &dyn ForumStore,
    sort: PostSort,
    community_id: Option<Uuid>,
    page: u32,
    size: u32,
) -> Result<Vec<Post>> {
    let mut tx = store.begin().await?;
    if let Some(community_id) = community_id {
        if tx.get_community(community_id).await?.is_none() {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
    }
    tx.list_posts(sort, community_id, Page::new(page, size))
        .await
}

/// Applies the fields present in `payload`. Only the author may edit; votes
/// and counters are untouched.
pub async fn update_post(
    store: &dyn ForumStore,
    post_id: Uuid,
    editor_id: Uuid,
    payload: UpdatePostRequest,
) -> Result<Post> {
    let mut tx = store.begin().await?;

    let mut post = tx
        .lock_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.author_id != editor_id {
        return Err(AppError::Authorization(
            "You can only edit your own posts".to_string(),
        ));
    }

    if let Some(title) = payload.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
        }
        post.title = title.to_string();
    }
    if payload.content.is_some() {
        post.content = payload.content;
    }
    if payload.url.is_some() {
        post.url = payload.url;
    }
    if payload.image_url.is_some() {
        post.image_url = payload.image_url;
    }
    if let Some(post_type) = payload.post_type {
        post.post_type = post_type;
    }

    check_content(
        post.post_type,
        post.content.as_deref(),
        post.url.as_deref(),
        post.image_url.as_deref(),
    )?;

    post.updated_at = Utc::now();
    tx.update_post(&post).await?;
    tx.commit().await?;

    tracing::info!("Post {} edited by {}", post_id, editor_id);

    Ok(post)
}

/// Newest posts from the communities the user joined, or from everywhere
/// when the user joined none.
pub async fn user_feed(
    store: &dyn ForumStore,
    user_id: Uuid,
    page: u32,
    size: u32,
) -> Result<Vec<Post>> {
    let mut tx = store.begin().await?;

    if tx.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let community_ids = tx.list_joined_community_ids(user_id).await?;
    let page = Page::new(page, size);
    if community_ids.is_empty() {
        return tx.list_posts(PostSort::New, None, page).await;
    }
    tx.list_posts_in_communities(&community_ids, page).await
}

pub async fn search_posts(
    store: &dyn ForumStore,
    query: &str,
    page: u32,
    size: u32,
) -> Result<Vec<Post>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidInput(
            "Search query cannot be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    tx.search_posts(query, Page::new(page, size)).await
}

/// Deletes the post with all its comments and every vote on either, then
/// recomputes karma for everyone whose content went away.
pub async fn delete_post(store: &dyn ForumStore, post_id: Uuid) -> Result<DeleteSummary> {
    let mut tx = store.begin().await?;

    let post = tx
        .lock_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let comment_ids = tx.list_comment_ids_for_post(post_id).await?;
    let mut authors = tx.list_comment_authors(&comment_ids).await?;
    authors.push(post.author_id);

    let comment_votes = tx
        .delete_votes_for_targets(TargetKind::Comment, &comment_ids)
        .await?;
    let post_votes = tx
        .delete_votes_for_targets(TargetKind::Post, &[post_id])
        .await?;
    let comments_deleted = tx.delete_comments(&comment_ids).await?;
    if !tx.delete_post(post_id).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let authors_recomputed = comment_service::recompute_authors(tx.as_mut(), authors).await?;
    tx.commit().await?;

    let summary = DeleteSummary {
        posts_deleted: 1,
        comments_deleted,
        votes_deleted: comment_votes + post_votes,
        authors_recomputed,
    };

    tracing::info!(
        "Deleted post {} with {} comments and {} votes",
        post_id,
        summary.comments_deleted,
        summary.votes_deleted
    );

    Ok(summary)
}
