use axum::{extract::State, response::Json};

use crate::{AppState, error::Result, models::ReconcileReport, services::reconcile_service};

/// Recomputes every cached counter from the ledger and membership tables.
pub async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileReport>> {
    let report = reconcile_service::reconcile_all(state.store.as_ref()).await?;
    Ok(Json(report))
}
