//! Cashflow ledger entries written when dues are approved.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One income line handed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeEntry {
    pub amount: i64,
    pub date: NaiveDate,
    pub note: String,
    pub evidence_url: String,
}
