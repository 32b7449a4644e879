//! Cashflow ledger endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::db::cashflows;
use crate::errors::ResultExt;
use crate::models::IncomeEntry;
use crate::AppState;

/// GET /api/cashflows/income - Income booked by dues approvals, newest first.
pub async fn list_income(State(state): State<AppState>) -> ApiResult<Vec<IncomeEntry>> {
    let mut conn = state.pool.acquire().await.context("acquire connection")?;
    success(cashflows::list_income(&mut conn).await?)
}
