use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{Result, required},
    models::{
        CreatePostRequest, DeleteSummary, Post, PostListResponse, PostSort, SearchQuery,
        UpdatePostRequest,
    },
    services::post_service,
};

#[derive(Debug, Deserialize)]
pub struct GetPostsQuery {
    pub sort: Option<PostSort>,
    pub community_id: Option<Uuid>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    // Validate input
    payload.validate()?;

    let user_id = required(payload.user_id, "user_id")?;
    let community_id = required(payload.community_id, "community_id")?;

    let post =
        post_service::create_post(state.store.as_ref(), user_id, community_id, payload).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_posts(
    State(state): State<AppState>,
    Query(query): Query<GetPostsQuery>,
) -> Result<Json<PostListResponse>> {
    let page = query.page.unwrap_or(0);
    let size = state.config.page_size(query.size);

    let posts = post_service::list_posts(
        state.store.as_ref(),
        query.sort.unwrap_or_default(),
        query.community_id,
        page,
        size,
    )
    .await?;

    Ok(Json(PostListResponse { posts, page, size }))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn get_user_feed(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<PostListResponse>> {
    let page = query.page.unwrap_or(0);
    let size = state.config.page_size(query.size);

    let posts = post_service::user_feed(state.store.as_ref(), user_id, page, size).await?;

    Ok(Json(PostListResponse { posts, page, size }))
}

pub async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PostListResponse>> {
    query.validate()?;

    let page = query.page.unwrap_or(0);
    let size = state.config.page_size(query.size);

    let posts = post_service::search_posts(state.store.as_ref(), &query.q, page, size).await?;

    Ok(Json(PostListResponse { posts, page, size }))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Post>> {
    let post = post_service::get_post(state.store.as_ref(), post_id).await?;
    Ok(Json(post))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>> {
    payload.validate()?;

    let user_id = required(payload.user_id, "user_id")?;
    let post = post_service::update_post(state.store.as_ref(), post_id, user_id, payload).await?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<DeleteSummary>> {
    let summary = post_service::delete_post(state.store.as_ref(), post_id).await?;
    Ok(Json(summary))
}
