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
    models::{Community, CreateCommunityRequest, MembershipRequest, SearchQuery, User},
    services::community_service,
};

#[derive(Debug, Deserialize)]
pub struct GetCommunitiesQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn create_community(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<Community>)> {
    // Validate input
    payload.validate()?;

    let user_id = required(payload.user_id, "user_id")?;
    let community =
        community_service::create_community(state.store.as_ref(), user_id, payload).await?;

    Ok((StatusCode::CREATED, Json(community)))
}

pub async fn get_community(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
) -> Result<Json<Community>> {
    let community = community_service::get_community(state.store.as_ref(), community_id).await?;
    Ok(Json(community))
}

pub async fn get_community_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Community>> {
    let community = community_service::get_community_by_name(state.store.as_ref(), &name).await?;
    Ok(Json(community))
}

pub async fn search_communities(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Community>>> {
    query.validate()?;

    let communities = community_service::search_communities(
        state.store.as_ref(),
        &query.q,
        query.page.unwrap_or(0),
        state.config.page_size(query.size),
    )
    .await?;
    Ok(Json(communities))
}

pub async fn get_community_members(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Query(query): Query<GetCommunitiesQuery>,
) -> Result<Json<Vec<User>>> {
    let members = community_service::get_members(
        state.store.as_ref(),
        community_id,
        query.page.unwrap_or(0),
        state.config.page_size(query.size),
    )
    .await?;
    Ok(Json(members))
}

pub async fn get_community_members_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<GetCommunitiesQuery>,
) -> Result<Json<Vec<User>>> {
    let members = community_service::get_members_by_name(
        state.store.as_ref(),
        &name,
        query.page.unwrap_or(0),
        state.config.page_size(query.size),
    )
    .await?;
    Ok(Json(members))
}

pub async fn get_popular_communities(
    State(state): State<AppState>,
    Query(query): Query<GetCommunitiesQuery>,
) -> Result<Json<Vec<Community>>> {
    let communities = community_service::popular_communities(
        state.store.as_ref(),
        query.page.unwrap_or(0),
        state.config.page_size(query.size),
    )
    .await?;
    Ok(Json(communities))
}

pub async fn join_community(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Json(payload): Json<MembershipRequest>,
) -> Result<Json<Community>> {
    let user_id = required(payload.user_id, "user_id")?;
    let community =
        community_service::join_community(state.store.as_ref(), community_id, user_id).await?;
    Ok(Json(community))
}

pub async fn leave_community(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Json(payload): Json<MembershipRequest>,
) -> Result<Json<Community>> {
    let user_id = required(payload.user_id, "user_id")?;
    let community =
        community_service::leave_community(state.store.as_ref(), community_id, user_id).await?;
    Ok(Json(community))
}
