//! Dues charge endpoints (administrator side).

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult};
use crate::models::{ChargePaidResponse, ChargeRequest, DuesCharge, ObligationPage, PageQuery};
use crate::AppState;

/// GET /api/dues - List charges, newest month first.
pub async fn list_charges(State(state): State<AppState>) -> ApiResult<Vec<DuesCharge>> {
    success(state.dues.list_charges().await?)
}

/// POST /api/dues - Charge every approved member for a month.
pub async fn create_charge(
    State(state): State<AppState>,
    Json(request): Json<ChargeRequest>,
) -> ApiResult<DuesCharge> {
    success(state.dues.create_charge(request.month, request.amount).await?)
}

/// GET /api/dues/:id
pub async fn get_charge(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<DuesCharge> {
    success(state.dues.get_charge(id).await?)
}

/// PUT /api/dues/:id - Edit a charge nobody has paid against yet.
pub async fn update_charge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ChargeRequest>,
) -> ApiResult<DuesCharge> {
    success(state.dues.edit_charge(id, request.month, request.amount).await?)
}

/// DELETE /api/dues/:id - Remove a charge together with its obligations.
pub async fn delete_charge(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.dues.remove_charge(id).await?;
    success(())
}

/// GET /api/dues/:id/paid - Whether anyone has started paying this charge.
pub async fn charge_paid(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ChargePaidResponse> {
    let paid = state.dues.check_paid(id).await?;
    success(ChargePaidResponse { paid })
}

/// GET /api/dues/:id/obligations - One page of a charge's obligations with totals.
pub async fn list_charge_obligations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<ObligationPage> {
    success(state.dues.list_obligations(id, page).await?)
}
