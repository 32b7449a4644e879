//! Member directory endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::db::members;
use crate::errors::{not_found, AppError, ResultExt};
use crate::models::{CreateMemberRequest, Member, MemberApprovalRequest};
use crate::AppState;

/// POST /api/members - Register a member.
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<Member> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }

    let mut conn = state.pool.acquire().await.context("acquire connection")?;
    let member = members::insert(&mut conn, name, request.is_approved).await?;

    tracing::info!("Registered member {} (approved={})", member.id, member.is_approved);
    success(member)
}

/// GET /api/members/:id - Get a single member.
pub async fn get_member(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Member> {
    let mut conn = state.pool.acquire().await.context("acquire connection")?;
    let member = members::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(not_found::MEMBER))?;
    success(member)
}

/// PUT /api/members/:id/approval - Approve or un-approve a member.
pub async fn set_member_approval(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<MemberApprovalRequest>,
) -> ApiResult<Member> {
    let mut conn = state.pool.acquire().await.context("acquire connection")?;

    if !members::set_approved(&mut conn, id, request.is_approved).await? {
        return Err(AppError::not_found(not_found::MEMBER));
    }
    let member = members::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(not_found::MEMBER))?;

    tracing::info!("Member {} approved={}", id, member.is_approved);
    success(member)
}
