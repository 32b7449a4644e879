//! Position queries.

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::errors::{AppError, ResultExt};
use crate::models::Position;

const POSITION_COLUMNS: &str = "id, name, level, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, name: &str, level: i64) -> Result<Position, AppError> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO positions (name, level, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING {}",
        POSITION_COLUMNS
    ))
    .bind(name)
    .bind(level)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("insert position")?;

    Ok(position_from_row(&row))
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    level: i64,
) -> Result<Option<Position>, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE positions SET name = ?, level = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {}",
        POSITION_COLUMNS
    ))
    .bind(name)
    .bind(level)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("update position")?;

    Ok(row.as_ref().map(position_from_row))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Position>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM positions WHERE id = ? AND deleted_at IS NULL",
        POSITION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find position")?;

    Ok(row.as_ref().map(position_from_row))
}

/// Resolve many ids in one query. Unknown or deleted ids are absent from the result.
pub async fn find_by_ids(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<Position>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM positions WHERE deleted_at IS NULL AND id IN (",
        POSITION_COLUMNS
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
        .context("find positions by ids")?;

    Ok(rows.iter().map(position_from_row).collect())
}

fn position_from_row(row: &sqlx::sqlite::SqliteRow) -> Position {
    Position {
        id: row.get("id"),
        name: row.get("name"),
        level: row.get("level"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
