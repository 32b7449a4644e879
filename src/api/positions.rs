//! Position endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::db::positions;
use crate::errors::{not_found, AppError, ResultExt};
use crate::models::{CreatePositionRequest, Position, UpdatePositionRequest};
use crate::AppState;

/// POST /api/positions - Create a position.
pub async fn create_position(
    State(state): State<AppState>,
    Json(request): Json<CreatePositionRequest>,
) -> ApiResult<Position> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }

    let mut conn = state.pool.acquire().await.context("acquire connection")?;
    success(positions::insert(&mut conn, name, request.level).await?)
}

/// PUT /api/positions/:id - Rename or re-level a position.
///
/// Structure entries written earlier keep the old name and level.
pub async fn update_position(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePositionRequest>,
) -> ApiResult<Position> {
    let mut conn = state.pool.acquire().await.context("acquire connection")?;

    let existing = positions::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(not_found::POSITION))?;

    let name = match request.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::validation("name is required")),
        Some(name) => name.to_string(),
        None => existing.name,
    };
    let level = request.level.unwrap_or(existing.level);

    let position = positions::update(&mut conn, id, &name, level)
        .await?
        .ok_or_else(|| AppError::not_found(not_found::POSITION))?;
    success(position)
}
