//! Organizational period, goal and structure queries.

use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::errors::{AppError, ResultExt};
use crate::models::{OrgPeriod, OrgStructureEntry, PeriodGoal};

const PERIOD_COLUMNS: &str = "id, start_date, end_date, is_active, created_at, updated_at";

/// Structure row ready for insertion, position attributes already snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStructureEntry {
    pub position_id: i64,
    pub position_name: String,
    pub position_level: i64,
    pub member_id: i64,
}

// ==================== PERIODS ====================

pub async fn insert(
    conn: &mut SqliteConnection,
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_active: bool,
) -> Result<OrgPeriod, AppError> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO org_periods (start_date, end_date, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        PERIOD_COLUMNS
    ))
    .bind(start_date)
    .bind(end_date)
    .bind(is_active)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("insert period")?;

    Ok(period_from_row(&row))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<OrgPeriod>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM org_periods WHERE id = ? AND deleted_at IS NULL",
        PERIOD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find period")?;

    Ok(row.as_ref().map(period_from_row))
}

pub async fn find_active_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<OrgPeriod>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM org_periods WHERE id = ? AND is_active = 1 AND deleted_at IS NULL",
        PERIOD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find active period")?;

    Ok(row.as_ref().map(period_from_row))
}

pub async fn find_active(conn: &mut SqliteConnection) -> Result<Option<OrgPeriod>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM org_periods WHERE is_active = 1 AND deleted_at IS NULL",
        PERIOD_COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await
    .context("find the active period")?;

    Ok(row.as_ref().map(period_from_row))
}

/// All live periods, most recently created first.
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<OrgPeriod>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM org_periods WHERE deleted_at IS NULL ORDER BY created_at DESC, id DESC",
        PERIOD_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await
    .context("list periods")?;

    Ok(rows.iter().map(period_from_row).collect())
}

pub async fn update_dates(
    conn: &mut SqliteConnection,
    id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Option<OrgPeriod>, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE org_periods SET start_date = ?, end_date = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {}",
        PERIOD_COLUMNS
    ))
    .bind(start_date)
    .bind(end_date)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("update period")?;

    Ok(row.as_ref().map(period_from_row))
}

/// Clear the active flag on every period.
pub async fn disable_all(conn: &mut SqliteConnection) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE org_periods SET is_active = 0, updated_at = ? WHERE is_active = 1",
    )
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .context("disable active periods")?;

    Ok(result.rows_affected())
}

pub async fn set_active(conn: &mut SqliteConnection, id: i64, is_active: bool) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE org_periods SET is_active = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(is_active)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("switch period status")?;

    Ok(result.rows_affected() > 0)
}

pub async fn other_active_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM org_periods WHERE id != ? AND is_active = 1 AND deleted_at IS NULL)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .context("check other active period")?;

    Ok(exists)
}

/// Activate the most recently created live period other than `exclude_id`.
///
/// Returns the id of the period that was activated, if any.
pub async fn enable_other_latest(
    conn: &mut SqliteConnection,
    exclude_id: i64,
) -> Result<Option<i64>, AppError> {
    let latest: Option<i64> = sqlx::query_scalar(
        r#"SELECT id FROM org_periods WHERE id != ? AND deleted_at IS NULL
           ORDER BY created_at DESC, id DESC LIMIT 1"#,
    )
    .bind(exclude_id)
    .fetch_optional(&mut *conn)
    .await
    .context("find latest other period")?;

    if let Some(id) = latest {
        set_active(conn, id, true).await?;
    }

    Ok(latest)
}

/// Soft-delete a period and force it inactive.
pub async fn soft_delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE org_periods SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("delete period")?;

    Ok(result.rows_affected() > 0)
}

// ==================== GOALS ====================

pub async fn insert_goal(
    conn: &mut SqliteConnection,
    period_id: i64,
    goal: &PeriodGoal,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO org_period_goals (org_period_id, vision, mission, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(period_id)
    .bind(&goal.vision)
    .bind(&goal.mission)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .context("insert period goal")?;

    Ok(())
}

/// The most recently appended goal of a period.
pub async fn latest_goal(
    conn: &mut SqliteConnection,
    period_id: i64,
) -> Result<Option<PeriodGoal>, AppError> {
    let row = sqlx::query(
        r#"SELECT vision, mission FROM org_period_goals
           WHERE org_period_id = ? AND deleted_at IS NULL ORDER BY id DESC LIMIT 1"#,
    )
    .bind(period_id)
    .fetch_optional(&mut *conn)
    .await
    .context("find period goal")?;

    Ok(row.map(|row| PeriodGoal {
        vision: row.get("vision"),
        mission: row.get("mission"),
    }))
}

// ==================== STRUCTURE ====================

/// Insert all entries of a period in one statement.
pub async fn insert_structure(
    conn: &mut SqliteConnection,
    period_id: i64,
    entries: &[NewStructureEntry],
) -> Result<u64, AppError> {
    if entries.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let mut query = QueryBuilder::<Sqlite>::new(
        "INSERT INTO org_structures (org_period_id, position_id, position_name, position_level, member_id, created_at) ",
    );
    query.push_values(entries, |mut row, entry| {
        row.push_bind(period_id)
            .push_bind(entry.position_id)
            .push_bind(entry.position_name.clone())
            .push_bind(entry.position_level)
            .push_bind(entry.member_id)
            .push_bind(now);
    });

    let result = query
        .build()
        .execute(&mut *conn)
        .await
        .context("insert period structure")?;

    Ok(result.rows_affected())
}

/// Visible structure of a period, highest-ranked positions first.
pub async fn find_structure(
    conn: &mut SqliteConnection,
    period_id: i64,
) -> Result<Vec<OrgStructureEntry>, AppError> {
    let rows = sqlx::query(
        r#"SELECT id, org_period_id, position_id, position_name, position_level, member_id, created_at
           FROM org_structures
           WHERE org_period_id = ? AND deleted_at IS NULL
           ORDER BY position_level, position_id, id"#,
    )
    .bind(period_id)
    .fetch_all(&mut *conn)
    .await
    .context("find period structure")?;

    Ok(rows
        .iter()
        .map(|row| OrgStructureEntry {
            id: row.get("id"),
            org_period_id: row.get("org_period_id"),
            position_id: row.get("position_id"),
            position_name: row.get("position_name"),
            position_level: row.get("position_level"),
            member_id: row.get("member_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Drop the structure of a period for good, used when it is rebuilt.
pub async fn purge_structure(conn: &mut SqliteConnection, period_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM org_structures WHERE org_period_id = ?")
        .bind(period_id)
        .execute(&mut *conn)
        .await
        .context("purge period structure")?;

    Ok(result.rows_affected())
}

/// Hide the structure of a removed period; the rows stay for history.
pub async fn hide_structure(conn: &mut SqliteConnection, period_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE org_structures SET deleted_at = ? WHERE org_period_id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(period_id)
    .execute(&mut *conn)
    .await
    .context("hide period structure")?;

    Ok(result.rows_affected())
}

fn period_from_row(row: &sqlx::sqlite::SqliteRow) -> OrgPeriod {
    OrgPeriod {
        id: row.get("id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
