//! Organization period endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::models::{
    CreatePeriodRequest, OrgPeriod, PeriodDetail, PeriodStatusRequest, UpdatePeriodRequest,
};
use crate::AppState;

/// GET /api/periods - List all periods.
pub async fn list_periods(State(state): State<AppState>) -> ApiResult<Vec<OrgPeriod>> {
    success(state.periods.list_periods().await?)
}

/// POST /api/periods - Create a period; it becomes the active one.
pub async fn create_period(
    State(state): State<AppState>,
    Json(request): Json<CreatePeriodRequest>,
) -> ApiResult<PeriodDetail> {
    success(state.periods.create_period(request).await?)
}

/// GET /api/periods/active
pub async fn get_active_period(State(state): State<AppState>) -> ApiResult<PeriodDetail> {
    success(state.periods.get_active_period().await?)
}

/// GET /api/periods/:id
pub async fn get_period(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<PeriodDetail> {
    success(state.periods.get_period(id).await?)
}

/// PUT /api/periods/:id - Edit the active period.
pub async fn update_period(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePeriodRequest>,
) -> ApiResult<PeriodDetail> {
    success(state.periods.edit_period(id, request).await?)
}

/// PUT /api/periods/:id/status - Activate or deactivate a period.
pub async fn set_period_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PeriodStatusRequest>,
) -> ApiResult<OrgPeriod> {
    success(state.periods.switch_status(id, request.is_active).await?)
}

/// DELETE /api/periods/:id
pub async fn delete_period(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.periods.remove_period(id).await?;
    success(())
}
