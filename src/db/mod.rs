//! Database module for SQLite persistence.
//!
//! Store functions take a `&mut SqliteConnection` so a service can run several
//! of them inside one transaction, or against a plain pooled connection.

pub mod cashflows;
pub mod documents;
pub mod dues;
pub mod members;
pub mod periods;
pub mod positions;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

use crate::errors::{AppError, ResultExt};

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Open a transaction that holds the write lock from its first statement.
///
/// Read-then-write sequences must start this way: a deferred transaction that
/// has already read cannot wait for the lock and fails with SQLITE_BUSY when
/// another writer got there first. With `BEGIN IMMEDIATE` concurrent writers
/// queue on the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, AppError> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .context("begin write transaction")
}

/// Create tables and indexes if they don't exist.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS positions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            level INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dues_charges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS member_dues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dues_charge_id INTEGER NOT NULL REFERENCES dues_charges(id),
            member_id INTEGER NOT NULL REFERENCES members(id),
            status TEXT NOT NULL DEFAULT 'unpaid'
                CHECK (status IN ('unpaid', 'waiting', 'paid')),
            evidence_url TEXT NOT NULL DEFAULT '',
            pay_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS cashflows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            amount INTEGER NOT NULL,
            date TEXT NOT NULL,
            note TEXT NOT NULL,
            evidence_url TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS org_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS org_period_goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_period_id INTEGER NOT NULL REFERENCES org_periods(id),
            vision TEXT NOT NULL,
            mission TEXT NOT NULL,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS org_structures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_period_id INTEGER NOT NULL REFERENCES org_periods(id),
            position_id INTEGER NOT NULL,
            position_name TEXT NOT NULL,
            position_level INTEGER NOT NULL,
            member_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER NOT NULL DEFAULT 0,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('dir', 'file')),
            url TEXT NOT NULL DEFAULT '',
            is_private INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    // The two partial unique indexes back the one-charge-per-month and
    // single-active-period rules at the storage level.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_dues_charges_month
            ON dues_charges(date) WHERE deleted_at IS NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_org_periods_single_active
            ON org_periods(is_active) WHERE is_active = 1 AND deleted_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_member_dues_charge ON member_dues(dues_charge_id);
        CREATE INDEX IF NOT EXISTS idx_member_dues_member ON member_dues(member_id);
        CREATE INDEX IF NOT EXISTS idx_org_structures_period ON org_structures(org_period_id);
        CREATE INDEX IF NOT EXISTS idx_documents_parent ON documents(parent_id);
        CREATE INDEX IF NOT EXISTS idx_members_approved ON members(is_approved);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
