//! Shared fixtures for service tests.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use tempfile::TempDir;

use super::{EvidenceUploader, Ledger};
use crate::db::{init_database, members, positions};
use crate::errors::AppError;
use crate::models::{IncomeEntry, Member, ObligationStatus, Position, UploadedFile};

/// Fresh SQLite database in a temporary directory.
pub(crate) struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        Self { pool, _dir: dir }
    }
}

pub(crate) async fn seed_member(pool: &SqlitePool, name: &str, is_approved: bool) -> Member {
    let mut conn = pool.acquire().await.unwrap();
    members::insert(&mut conn, name, is_approved).await.unwrap()
}

pub(crate) async fn seed_position(pool: &SqlitePool, name: &str, level: i64) -> Position {
    let mut conn = pool.acquire().await.unwrap();
    positions::insert(&mut conn, name, level).await.unwrap()
}

/// Force an obligation into `status`, bypassing the state machine.
pub(crate) async fn set_obligation_status(
    pool: &SqlitePool,
    charge_id: i64,
    member_id: i64,
    status: ObligationStatus,
) {
    sqlx::query("UPDATE member_dues SET status = ? WHERE dues_charge_id = ? AND member_id = ?")
        .bind(status.as_str())
        .bind(charge_id)
        .bind(member_id)
        .execute(pool)
        .await
        .unwrap();
}

pub(crate) fn evidence(filename: &str) -> UploadedFile {
    UploadedFile {
        filename: filename.to_string(),
        bytes: b"evidence".to_vec(),
    }
}

/// Keeps uploads in memory and hands out `memory://<n>/<filename>` URLs.
#[derive(Default)]
pub(crate) struct MemoryUploader {
    uploads: Mutex<Vec<String>>,
}

impl MemoryUploader {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvidenceUploader for MemoryUploader {
    async fn upload(&self, filename: &str, _bytes: &[u8]) -> Result<String, AppError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(filename.to_string());
        Ok(format!("memory://{}/{}", uploads.len(), filename))
    }
}

/// Ledger that is always unavailable.
pub(crate) struct FailingLedger;

#[async_trait]
impl Ledger for FailingLedger {
    async fn record_income(
        &self,
        _conn: &mut SqliteConnection,
        _entry: &IncomeEntry,
    ) -> Result<i64, AppError> {
        Err(AppError::Ledger("ledger offline".to_string()))
    }
}
