//! Cashflow ledger rows.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::errors::{AppError, ResultExt};
use crate::models::IncomeEntry;

pub async fn insert_income(conn: &mut SqliteConnection, entry: &IncomeEntry) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO cashflows (kind, amount, date, note, evidence_url, created_at)
           VALUES ('income', ?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(entry.amount)
    .bind(entry.date)
    .bind(&entry.note)
    .bind(&entry.evidence_url)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .context("insert income cashflow")?;

    Ok(id)
}

/// Income entries, newest first.
pub async fn list_income(conn: &mut SqliteConnection) -> Result<Vec<IncomeEntry>, AppError> {
    let rows = sqlx::query(
        r#"SELECT amount, date, note, evidence_url FROM cashflows
           WHERE kind = 'income' AND deleted_at IS NULL ORDER BY id DESC"#,
    )
    .fetch_all(&mut *conn)
    .await
    .context("list income cashflows")?;

    Ok(rows
        .iter()
        .map(|row| IncomeEntry {
            amount: row.get("amount"),
            date: row.get("date"),
            note: row.get("note"),
            evidence_url: row.get("evidence_url"),
        })
        .collect())
}
