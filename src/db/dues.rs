//! Dues charge and member obligation queries.

use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqliteConnection};

use crate::errors::{AppError, ConflictKind, ResultExt};
use crate::models::{DuesCharge, MemberObligation, ObligationDetail, ObligationStatus};

const CHARGE_COLUMNS: &str = "id, date, amount, created_at, updated_at";

const DETAIL_SELECT: &str = r#"
    SELECT md.id, md.dues_charge_id, md.member_id, md.status, md.evidence_url, md.pay_date,
           md.created_at, md.updated_at, m.name AS member_name, dc.date AS month, dc.amount
    FROM member_dues md
    JOIN members m ON m.id = md.member_id
    JOIN dues_charges dc ON dc.id = md.dues_charge_id
    WHERE md.deleted_at IS NULL AND dc.deleted_at IS NULL"#;

// ==================== CHARGES ====================

pub async fn insert_charge(
    conn: &mut SqliteConnection,
    month: NaiveDate,
    amount: i64,
) -> Result<DuesCharge, AppError> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO dues_charges (date, amount, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING {}",
        CHARGE_COLUMNS
    ))
    .bind(month)
    .bind(amount)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|err| month_conflict_or(err, "insert dues charge"))?;

    Ok(charge_from_row(&row))
}

pub async fn find_charge(conn: &mut SqliteConnection, id: i64) -> Result<Option<DuesCharge>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM dues_charges WHERE id = ? AND deleted_at IS NULL",
        CHARGE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find dues charge")?;

    Ok(row.as_ref().map(charge_from_row))
}

/// Whether a live charge already occupies `month`, ignoring `exclude_id`.
pub async fn month_taken(
    conn: &mut SqliteConnection,
    month: NaiveDate,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM dues_charges WHERE date = ? AND id != ? AND deleted_at IS NULL)",
    )
    .bind(month)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(&mut *conn)
    .await
    .context("check dues charge month")?;

    Ok(taken)
}

pub async fn update_charge(
    conn: &mut SqliteConnection,
    id: i64,
    month: NaiveDate,
    amount: i64,
) -> Result<Option<DuesCharge>, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE dues_charges SET date = ?, amount = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {}",
        CHARGE_COLUMNS
    ))
    .bind(month)
    .bind(amount)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| month_conflict_or(err, "update dues charge"))?;

    Ok(row.as_ref().map(charge_from_row))
}

pub async fn soft_delete_charge(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE dues_charges SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("delete dues charge")?;

    Ok(result.rows_affected() > 0)
}

/// All live charges, newest month first.
pub async fn list_charges(conn: &mut SqliteConnection) -> Result<Vec<DuesCharge>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM dues_charges WHERE deleted_at IS NULL ORDER BY date DESC",
        CHARGE_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await
    .context("list dues charges")?;

    Ok(rows.iter().map(charge_from_row).collect())
}

/// True once any obligation of the charge has left `unpaid`.
pub async fn has_payment_activity(conn: &mut SqliteConnection, charge_id: i64) -> Result<bool, AppError> {
    let paid: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM member_dues WHERE dues_charge_id = ? AND status != 'unpaid' AND deleted_at IS NULL)",
    )
    .bind(charge_id)
    .fetch_one(&mut *conn)
    .await
    .context("check dues payment activity")?;

    Ok(paid)
}

// ==================== OBLIGATIONS ====================

/// Insert one `unpaid` obligation for every approved member in a single statement.
pub async fn generate_obligations(conn: &mut SqliteConnection, charge_id: i64) -> Result<u64, AppError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"INSERT INTO member_dues (dues_charge_id, member_id, status, evidence_url, created_at, updated_at)
           SELECT ?, id, ?, '', ?, ?
           FROM members
           WHERE is_approved = 1 AND deleted_at IS NULL"#,
    )
    .bind(charge_id)
    .bind(ObligationStatus::Unpaid.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .context("generate member obligations")?;

    Ok(result.rows_affected())
}

pub async fn soft_delete_obligations_by_charge(
    conn: &mut SqliteConnection,
    charge_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE member_dues SET deleted_at = ? WHERE dues_charge_id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(charge_id)
    .execute(&mut *conn)
    .await
    .context("delete member obligations")?;

    Ok(result.rows_affected())
}

pub async fn find_obligation(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<ObligationDetail>, AppError> {
    let row = sqlx::query(&format!("{} AND md.id = ?", DETAIL_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("find member obligation")?;

    row.as_ref().map(detail_from_row).transpose()
}

/// The obligation if it belongs to `member_id` and is still `unpaid`.
pub async fn find_unpaid_for_member(
    conn: &mut SqliteConnection,
    id: i64,
    member_id: i64,
) -> Result<Option<ObligationDetail>, AppError> {
    let row = sqlx::query(&format!(
        "{} AND md.id = ? AND md.member_id = ? AND md.status = 'unpaid'",
        DETAIL_SELECT
    ))
    .bind(id)
    .bind(member_id)
    .fetch_optional(&mut *conn)
    .await
    .context("find unpaid member obligation")?;

    row.as_ref().map(detail_from_row).transpose()
}

/// The obligation if it is in any state other than `paid`.
pub async fn find_unsettled(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<ObligationDetail>, AppError> {
    let row = sqlx::query(&format!("{} AND md.id = ? AND md.status != 'paid'", DETAIL_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("find unsettled member obligation")?;

    row.as_ref().map(detail_from_row).transpose()
}

/// `unpaid -> waiting` for the owning member, storing the evidence.
pub async fn mark_waiting(
    conn: &mut SqliteConnection,
    id: i64,
    member_id: i64,
    evidence_url: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"UPDATE member_dues SET status = ?, evidence_url = ?, updated_at = ?
           WHERE id = ? AND member_id = ? AND status = ? AND deleted_at IS NULL"#,
    )
    .bind(ObligationStatus::Waiting.as_str())
    .bind(evidence_url)
    .bind(Utc::now())
    .bind(id)
    .bind(member_id)
    .bind(ObligationStatus::Unpaid.as_str())
    .execute(&mut *conn)
    .await
    .context("submit member payment")?;

    Ok(result.rows_affected() > 0)
}

pub async fn replace_evidence(
    conn: &mut SqliteConnection,
    id: i64,
    evidence_url: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"UPDATE member_dues SET evidence_url = ?, updated_at = ?
           WHERE id = ? AND status != 'paid' AND deleted_at IS NULL"#,
    )
    .bind(evidence_url)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("replace payment evidence")?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_paid(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"UPDATE member_dues SET status = ?, pay_date = ?, updated_at = ?
           WHERE id = ? AND status != ? AND deleted_at IS NULL"#,
    )
    .bind(ObligationStatus::Paid.as_str())
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(ObligationStatus::Paid.as_str())
    .execute(&mut *conn)
    .await
    .context("approve member payment")?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_by_charge(
    conn: &mut SqliteConnection,
    charge_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ObligationDetail>, AppError> {
    let rows = sqlx::query(&format!(
        "{} AND md.dues_charge_id = ? ORDER BY m.name, md.id LIMIT ? OFFSET ?",
        DETAIL_SELECT
    ))
    .bind(charge_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await
    .context("list member obligations")?;

    rows.iter().map(detail_from_row).collect()
}

/// Count obligations of a charge that are paid (`paid = true`) or not yet paid.
pub async fn count_by_charge(
    conn: &mut SqliteConnection,
    charge_id: i64,
    paid: bool,
) -> Result<i64, AppError> {
    let sql = if paid {
        "SELECT COUNT(*) FROM member_dues WHERE dues_charge_id = ? AND status = 'paid' AND deleted_at IS NULL"
    } else {
        "SELECT COUNT(*) FROM member_dues WHERE dues_charge_id = ? AND status != 'paid' AND deleted_at IS NULL"
    };

    let count: i64 = sqlx::query_scalar(sql)
        .bind(charge_id)
        .fetch_one(&mut *conn)
        .await
        .context("count member obligations")?;

    Ok(count)
}

/// Every live obligation of a member, newest month first.
pub async fn list_by_member(
    conn: &mut SqliteConnection,
    member_id: i64,
) -> Result<Vec<ObligationDetail>, AppError> {
    let rows = sqlx::query(&format!(
        "{} AND md.member_id = ? ORDER BY dc.date DESC",
        DETAIL_SELECT
    ))
    .bind(member_id)
    .fetch_all(&mut *conn)
    .await
    .context("list obligations of member")?;

    rows.iter().map(detail_from_row).collect()
}

/// A concurrent writer that claimed the month first trips the partial unique index.
fn month_conflict_or(err: sqlx::Error, operation: &'static str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ConflictKind::MonthAlreadyCharged.into(),
        _ => AppError::Database(format!("{}: {}", operation, err)),
    }
}

fn charge_from_row(row: &sqlx::sqlite::SqliteRow) -> DuesCharge {
    DuesCharge {
        id: row.get("id"),
        month: row.get("date"),
        amount: row.get("amount"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn obligation_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MemberObligation, AppError> {
    let raw_status: String = row.try_get("status").context("decode obligation status")?;
    let status = ObligationStatus::parse(&raw_status)
        .ok_or_else(|| AppError::Database(format!("unknown obligation status: {}", raw_status)))?;

    Ok(MemberObligation {
        id: row.get("id"),
        dues_charge_id: row.get("dues_charge_id"),
        member_id: row.get("member_id"),
        status,
        evidence_url: row.get("evidence_url"),
        pay_date: row.get("pay_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn detail_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ObligationDetail, AppError> {
    Ok(ObligationDetail {
        obligation: obligation_from_row(row)?,
        member_name: row.get("member_name"),
        month: row.get("month"),
        amount: row.get("amount"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::TestDb;

    #[tokio::test]
    async fn test_unknown_status_is_a_decode_error() {
        let db = TestDb::new().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let row = sqlx::query("SELECT 1 AS id, 'refunded' AS status")
            .fetch_one(&mut *conn)
            .await
            .unwrap();

        match obligation_from_row(&row) {
            Err(AppError::Database(msg)) => assert!(msg.contains("refunded")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
