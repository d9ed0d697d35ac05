use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::Result,
    models::{CreateUserRequest, User},
    services::user_service,
};

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    payload.validate()?;

    let user = user_service::create_user(state.store.as_ref(), &payload.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>> {
    let user = user_service::get_user(state.store.as_ref(), user_id).await?;
    Ok(Json(user))
}
