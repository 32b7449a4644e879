//! Monthly dues charges and the per-member obligations they fan out to.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Payment progress of one member's obligation.
///
/// Moves forward only: `Unpaid -> Waiting -> Paid`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObligationStatus {
    #[default]
    Unpaid,
    Waiting,
    Paid,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Unpaid => "unpaid",
            ObligationStatus::Waiting => "waiting",
            ObligationStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(ObligationStatus::Unpaid),
            "waiting" => Some(ObligationStatus::Waiting),
            "paid" => Some(ObligationStatus::Paid),
            _ => None,
        }
    }
}

/// Truncate any date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// A monthly amount owed by every approved member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuesCharge {
    pub id: i64,
    /// Always the first day of the charged month.
    pub month: NaiveDate,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One member's instance of owing a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberObligation {
    pub id: i64,
    pub dues_charge_id: i64,
    pub member_id: i64,
    pub status: ObligationStatus,
    pub evidence_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Obligation joined with the member name and charge it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationDetail {
    #[serde(flatten)]
    pub obligation: MemberObligation,
    pub member_name: String,
    pub month: NaiveDate,
    pub amount: i64,
}

/// Page of obligations for one charge plus charge-wide totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationPage {
    pub items: Vec<ObligationDetail>,
    /// Number of obligations already paid.
    pub paid_total: i64,
    /// Number of obligations not yet paid (unpaid or waiting).
    pub unpaid_total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for creating or editing a charge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub month: NaiveDate,
    pub amount: i64,
}

/// Request body for the admin approval transition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationStatusRequest {
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePaidResponse {
    pub paid: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}
