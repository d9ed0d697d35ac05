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
        Comment, CommentSort, CountResponse, CreateCommentRequest, DeleteSummary, ThreadResponse,
        UpdateCommentRequest,
    },
    services::comment_service,
};

#[derive(Debug, Deserialize)]
pub struct GetCommentsQuery {
    pub sort: Option<CommentSort>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<GetCommentsQuery>,
) -> Result<Json<ThreadResponse>> {
    let page = query.page.unwrap_or(0);
    let size = state.config.page_size(query.size);

    let comments = comment_service::get_thread(
        state.store.as_ref(),
        post_id,
        page,
        size,
        query.sort.unwrap_or_default(),
    )
    .await?;

    Ok(Json(ThreadResponse {
        post_id,
        page,
        size,
        comments,
    }))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    payload.validate()?;

    let user_id = required(payload.user_id, "user_id")?;
    let post_id = required(payload.post_id, "post_id")?;

    let comment = comment_service::add_comment(
        state.store.as_ref(),
        user_id,
        post_id,
        &payload.content,
        payload.parent_comment_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Comment>> {
    let comment = comment_service::get_comment(state.store.as_ref(), comment_id).await?;
    Ok(Json(comment))
}

pub async fn get_comment_replies(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Query(query): Query<GetCommentsQuery>,
) -> Result<Json<Vec<Comment>>> {
    let replies = comment_service::get_replies(
        state.store.as_ref(),
        comment_id,
        query.page.unwrap_or(0),
        state.config.page_size(query.size),
        query.sort.unwrap_or_default(),
    )
    .await?;
    Ok(Json(replies))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>> {
    payload.validate()?;

    let user_id = required(payload.user_id, "user_id")?;
    let comment =
        comment_service::update_comment(state.store.as_ref(), comment_id, user_id, &payload.content)
            .await?;

    Ok(Json(comment))
}

pub async fn get_post_comment_count(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<CountResponse>> {
    let count = comment_service::count_comments(state.store.as_ref(), post_id).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn get_reply_count(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<CountResponse>> {
    let count = comment_service::count_replies(state.store.as_ref(), comment_id).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<DeleteSummary>> {
    let summary = comment_service::delete_comment(state.store.as_ref(), comment_id).await?;
    Ok(Json(summary))
}
