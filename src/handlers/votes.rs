use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{Result, required},
    models::{VoteRequest, VoteResponse, VoteStatusResponse, VoteTarget, VoteType},
    services::voting_service,
};

pub async fn vote_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    cast(&state, VoteTarget::Post(post_id), payload).await
}

pub async fn vote_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    cast(&state, VoteTarget::Comment(comment_id), payload).await
}

pub async fn remove_post_vote(
    State(state): State<AppState>,
    Path((post_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VoteResponse>> {
    let response =
        voting_service::remove_vote(state.store.as_ref(), user_id, VoteTarget::Post(post_id))
            .await?;
    Ok(Json(response))
}

pub async fn remove_comment_vote(
    State(state): State<AppState>,
    Path((comment_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VoteResponse>> {
    let response = voting_service::remove_vote(
        state.store.as_ref(),
        user_id,
        VoteTarget::Comment(comment_id),
    )
    .await?;
    Ok(Json(response))
}

pub async fn get_post_vote(
    State(state): State<AppState>,
    Path((post_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VoteStatusResponse>> {
    let vote_type =
        voting_service::get_user_vote(state.store.as_ref(), user_id, VoteTarget::Post(post_id))
            .await?;
    Ok(Json(VoteStatusResponse { vote_type }))
}

pub async fn get_comment_vote(
    State(state): State<AppState>,
    Path((comment_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VoteStatusResponse>> {
    let vote_type = voting_service::get_user_vote(
        state.store.as_ref(),
        user_id,
        VoteTarget::Comment(comment_id),
    )
    .await?;
    Ok(Json(VoteStatusResponse { vote_type }))
}

async fn cast(
    state: &AppState,
    target: VoteTarget,
    payload: VoteRequest,
) -> Result<Json<VoteResponse>> {
    let user_id = required(payload.user_id, "user_id")?;
    let vote_type: VoteType = required(payload.vote_type, "vote_type")?.parse()?;

    let response =
        voting_service::cast_vote(state.store.as_ref(), user_id, target, vote_type).await?;
    Ok(Json(response))
}
