//! Member obligation endpoints: paying, revising evidence and approval.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use super::{read_multipart, success, ApiResult};
use crate::auth::CurrentMember;
use crate::errors::AppError;
use crate::models::{ObligationDetail, ObligationStatusRequest, UploadedFile};
use crate::AppState;

/// Multipart field carrying the proof of payment.
const EVIDENCE_FIELD: &str = "evidence";

async fn read_evidence(state: &AppState, multipart: Multipart) -> Result<UploadedFile, AppError> {
    let mut form = read_multipart(multipart, state.config.max_upload_bytes).await?;
    form.take_file(EVIDENCE_FIELD)
        .ok_or_else(|| AppError::validation("evidence file is required"))
}

/// GET /api/me/dues - The calling member's obligations.
pub async fn my_obligations(
    State(state): State<AppState>,
    CurrentMember(member_id): CurrentMember,
) -> ApiResult<Vec<ObligationDetail>> {
    success(state.dues.list_member_obligations(member_id).await?)
}

/// POST /api/me/dues/:id/payment - Submit evidence for an unpaid obligation.
pub async fn submit_payment(
    State(state): State<AppState>,
    CurrentMember(member_id): CurrentMember,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<ObligationDetail> {
    let evidence = read_evidence(&state, multipart).await?;
    success(state.payments.submit_payment(id, member_id, evidence).await?)
}

/// GET /api/obligations/:id
pub async fn get_obligation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ObligationDetail> {
    success(state.payments.get_obligation(id).await?)
}

/// PUT /api/obligations/:id/evidence - Replace evidence before approval.
pub async fn revise_evidence(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<ObligationDetail> {
    let evidence = read_evidence(&state, multipart).await?;
    success(state.payments.revise_evidence(id, evidence).await?)
}

/// PUT /api/obligations/:id/status - Approve a payment and book the income.
pub async fn update_obligation_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ObligationStatusRequest>,
) -> ApiResult<ObligationDetail> {
    success(state.payments.approve(id, request.is_paid).await?)
}
