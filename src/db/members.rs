//! Member directory queries.

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::errors::{AppError, ResultExt};
use crate::models::Member;

const MEMBER_COLUMNS: &str = "id, name, is_approved, created_at, updated_at";

pub async fn insert(
    conn: &mut SqliteConnection,
    name: &str,
    is_approved: bool,
) -> Result<Member, AppError> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO members (name, is_approved, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING {}",
        MEMBER_COLUMNS
    ))
    .bind(name)
    .bind(is_approved)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("insert member")?;

    Ok(member_from_row(&row))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Member>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM members WHERE id = ? AND deleted_at IS NULL",
        MEMBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find member")?;

    Ok(row.as_ref().map(member_from_row))
}

/// Resolve many ids in one query. Unknown or deleted ids are absent from the result.
pub async fn find_by_ids(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<Member>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM members WHERE deleted_at IS NULL AND id IN (",
        MEMBER_COLUMNS
    ));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows = query
        .build()
        .fetch_all(&mut *conn)
        .await
        .context("find members by ids")?;

    Ok(rows.iter().map(member_from_row).collect())
}

pub async fn set_approved(
    conn: &mut SqliteConnection,
    id: i64,
    is_approved: bool,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE members SET is_approved = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(is_approved)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("update member approval")?;

    Ok(result.rows_affected() > 0)
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Member {
    Member {
        id: row.get("id"),
        name: row.get("name"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
