//! Association member as seen by the dues and period modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered member of the association.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i64,
    pub name: String,
    /// Only approved members receive dues obligations.
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering a member.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub name: String,
    #[serde(default)]
    pub is_approved: bool,
}

/// Request body for the admin approval toggle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberApprovalRequest {
    pub is_approved: bool,
}
