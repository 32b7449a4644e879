//! Cashflow ledger collaborator.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::db::cashflows;
use crate::errors::AppError;
use crate::models::IncomeEntry;

/// Records income. Runs on the caller's connection so the entry commits or
/// rolls back together with the caller's other writes.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn record_income(
        &self,
        conn: &mut SqliteConnection,
        entry: &IncomeEntry,
    ) -> Result<i64, AppError>;
}

/// Ledger backed by the `cashflows` table.
pub struct SqlLedger;

#[async_trait]
impl Ledger for SqlLedger {
    async fn record_income(
        &self,
        conn: &mut SqliteConnection,
        entry: &IncomeEntry,
    ) -> Result<i64, AppError> {
        cashflows::insert_income(conn, entry)
            .await
            .map_err(|e| AppError::Ledger(e.to_string()))
    }
}
