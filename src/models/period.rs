//! Organizational periods, their goals and their leadership structure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A bounded organizational term. At most one is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgPeriod {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vision and mission recorded for a period. Append-only; the latest wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodGoal {
    pub vision: String,
    pub mission: String,
}

/// "This member held this position during this period".
///
/// Position name and level are copied at write time so the entry reads the
/// same after the position is renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgStructureEntry {
    pub id: i64,
    pub org_period_id: i64,
    pub position_id: i64,
    pub position_name: String,
    pub position_level: i64,
    pub member_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Members submitted for one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureInput {
    pub position_id: i64,
    #[serde(default)]
    pub members: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDetail {
    #[serde(flatten)]
    pub period: OrgPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<PeriodGoal>,
    pub structure: Vec<OrgStructureEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePeriodRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub structure: Vec<StructureInput>,
    pub goal: PeriodGoal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePeriodRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// When present, replaces the whole structure of the period.
    #[serde(default)]
    pub structure: Option<Vec<StructureInput>>,
    /// When present, appended as the newest goal.
    #[serde(default)]
    pub goal: Option<PeriodGoal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStatusRequest {
    pub is_active: bool,
}
