//! Organizational period activation and structure snapshots.
//!
//! At most one live period is active. Creating or activating a period first
//! clears the flag everywhere; deactivating or removing the active period hands
//! the flag to the most recently created remaining period.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::periods::{self, NewStructureEntry};
use crate::db::{self, members, positions};
use crate::errors::{not_found, AppError, ConflictKind, ResultExt};
use crate::models::{
    CreatePeriodRequest, OrgPeriod, PeriodDetail, PeriodGoal, Position, StructureInput,
    UpdatePeriodRequest,
};

pub struct PeriodService {
    pool: SqlitePool,
}

impl PeriodService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a period as the new active one, with its goal and structure.
    pub async fn create_period(&self, request: CreatePeriodRequest) -> Result<PeriodDetail, AppError> {
        validate_range(request.start_date, request.end_date)?;
        validate_goal(&request.goal)?;

        let mut tx = db::begin_write(&self.pool).await?;

        periods::disable_all(&mut *tx).await?;
        let period = periods::insert(&mut *tx, request.start_date, request.end_date, true).await?;
        periods::insert_goal(&mut *tx, period.id, &request.goal).await?;
        let entries = build_structure(&mut *tx, period.id, &request.structure).await?;

        let detail = load_detail(&mut *tx, period).await?;
        tx.commit().await.context("commit period")?;

        tracing::info!(
            "Created period {} ({} - {}) with {} structure entries",
            detail.period.id,
            detail.period.start_date,
            detail.period.end_date,
            entries
        );
        Ok(detail)
    }

    pub async fn switch_status(&self, id: i64, is_active: bool) -> Result<OrgPeriod, AppError> {
        let mut tx = db::begin_write(&self.pool).await?;

        if periods::find_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::PERIOD));
        }

        if is_active {
            periods::disable_all(&mut *tx).await?;
            periods::set_active(&mut *tx, id, true).await?;
        } else {
            periods::set_active(&mut *tx, id, false).await?;
            if !periods::other_active_exists(&mut *tx, id).await? {
                if let Some(fallback) = periods::enable_other_latest(&mut *tx, id).await? {
                    tracing::info!("Period {} deactivated, activated period {}", id, fallback);
                }
            }
        }

        let period = periods::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::PERIOD))?;
        tx.commit().await.context("commit period status")?;

        tracing::info!("Switched period {} active={}", id, is_active);
        Ok(period)
    }

    /// Soft-delete a period and hide its structure. If no period is left
    /// active, the most recently created remaining one takes over; its own
    /// structure was never hidden and shows as it was.
    pub async fn remove_period(&self, id: i64) -> Result<(), AppError> {
        let mut tx = db::begin_write(&self.pool).await?;

        if periods::find_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::PERIOD));
        }

        periods::soft_delete(&mut *tx, id).await?;
        periods::hide_structure(&mut *tx, id).await?;

        let fallback = if periods::other_active_exists(&mut *tx, id).await? {
            None
        } else {
            periods::enable_other_latest(&mut *tx, id).await?
        };

        tx.commit().await.context("commit period removal")?;

        tracing::info!("Removed period {} (activated: {:?})", id, fallback);
        Ok(())
    }

    /// Edit the active period. Structure is replaced wholesale when given; a
    /// goal is appended when given.
    pub async fn edit_period(&self, id: i64, request: UpdatePeriodRequest) -> Result<PeriodDetail, AppError> {
        validate_range(request.start_date, request.end_date)?;
        if let Some(goal) = &request.goal {
            validate_goal(goal)?;
        }

        let mut tx = db::begin_write(&self.pool).await?;

        if periods::find_active_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::PERIOD));
        }

        let period = periods::update_dates(&mut *tx, id, request.start_date, request.end_date)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::PERIOD))?;

        if let Some(structure) = &request.structure {
            periods::purge_structure(&mut *tx, id).await?;
            build_structure(&mut *tx, id, structure).await?;
        }
        if let Some(goal) = &request.goal {
            periods::insert_goal(&mut *tx, id, goal).await?;
        }

        let detail = load_detail(&mut *tx, period).await?;
        tx.commit().await.context("commit period update")?;

        tracing::info!("Updated period {}", id);
        Ok(detail)
    }

    pub async fn get_period(&self, id: i64) -> Result<PeriodDetail, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        let period = periods::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::PERIOD))?;
        load_detail(&mut *conn, period).await
    }

    pub async fn get_active_period(&self) -> Result<PeriodDetail, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        let period = periods::find_active(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::PERIOD))?;
        load_detail(&mut *conn, period).await
    }

    pub async fn list_periods(&self) -> Result<Vec<OrgPeriod>, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        periods::list(&mut *conn).await
    }
}

async fn load_detail(conn: &mut SqliteConnection, period: OrgPeriod) -> Result<PeriodDetail, AppError> {
    let goal = periods::latest_goal(conn, period.id).await?;
    let structure = periods::find_structure(conn, period.id).await?;
    Ok(PeriodDetail {
        period,
        goal,
        structure,
    })
}

/// Resolve the submitted positions and members with one batched lookup each,
/// then bulk-insert the snapshot rows. Returns the number of rows written.
async fn build_structure(
    conn: &mut SqliteConnection,
    period_id: i64,
    inputs: &[StructureInput],
) -> Result<u64, AppError> {
    let position_ids: Vec<i64> = inputs
        .iter()
        .map(|input| input.position_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let member_ids: Vec<i64> = inputs
        .iter()
        .flat_map(|input| input.members.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let known_positions = positions::find_by_ids(conn, &position_ids).await?;
    let known_members: HashSet<i64> = members::find_by_ids(conn, &member_ids)
        .await?
        .into_iter()
        .map(|member| member.id)
        .collect();

    let entries = resolve_structure(inputs, &known_positions, &known_members);
    periods::insert_structure(conn, period_id, &entries).await
}

/// Snapshot rows for every resolvable (position, member) pair.
///
/// Unknown positions and members are dropped silently; a repeated pair is
/// written once.
fn resolve_structure(
    inputs: &[StructureInput],
    known_positions: &[Position],
    known_members: &HashSet<i64>,
) -> Vec<NewStructureEntry> {
    let positions: HashMap<i64, &Position> = known_positions.iter().map(|p| (p.id, p)).collect();
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for input in inputs {
        let Some(position) = positions.get(&input.position_id) else {
            continue;
        };
        for member_id in &input.members {
            if !known_members.contains(member_id) || !seen.insert((position.id, *member_id)) {
                continue;
            }
            entries.push(NewStructureEntry {
                position_id: position.id,
                position_name: position.name.clone(),
                position_level: position.level,
                member_id: *member_id,
            });
        }
    }

    entries
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(ConflictKind::EndBeforeStart.into());
    }
    Ok(())
}

fn validate_goal(goal: &PeriodGoal) -> Result<(), AppError> {
    if goal.vision.trim().is_empty() {
        return Err(AppError::validation("vision is required"));
    }
    if goal.mission.trim().is_empty() {
        return Err(AppError::validation("mission is required"));
    }
    Ok(())
}
