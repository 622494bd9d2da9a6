use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

/// Where a correction request stands. `Approved { level }` with `level` equal
/// to the request's level count is the terminal, materialized state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStatus {
    Pending,
    Approved { level: u8 },
    Rejected,
    AdminCancelled,
}

impl fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionStatus::Pending => write!(f, "pending"),
            CorrectionStatus::Approved { level } => write!(f, "n{}_approved", level),
            CorrectionStatus::Rejected => write!(f, "rejected"),
            CorrectionStatus::AdminCancelled => write!(f, "admin_cancelled"),
        }
    }
}

impl FromStr for CorrectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CorrectionStatus::Pending),
            "rejected" => Ok(CorrectionStatus::Rejected),
            "admin_cancelled" => Ok(CorrectionStatus::AdminCancelled),
            other => other
                .strip_prefix('n')
                .and_then(|rest| rest.strip_suffix("_approved"))
                .and_then(|level| level.parse::<u8>().ok())
                .filter(|level| *level > 0)
                .map(|level| CorrectionStatus::Approved { level })
                .ok_or_else(|| format!("Invalid correction status: {}", s)),
        }
    }
}

impl Serialize for CorrectionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CorrectionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One approval level. Undecided slots have every field but `level` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalSlot {
    #[schema(example = 1)]
    pub level: u8,
    pub decision: Option<ApprovalDecision>,
    pub approver_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl ApprovalSlot {
    pub fn open(level: u8) -> Self {
        Self {
            level,
            decision: None,
            approver_id: None,
            decided_at: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub work_date: NaiveDate,
    #[schema(example = "08:30:00", value_type = Option<String>, format = "time")]
    pub requested_clock_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = Option<String>, format = "time")]
    pub requested_clock_out: Option<NaiveTime>,
    #[schema(example = "Badge reader was down")]
    pub reason: String,
    #[schema(example = "pending", value_type = String)]
    pub status: CorrectionStatus,
    /// Number of approval levels, frozen when the request was filed.
    #[schema(example = 3)]
    pub levels: u8,
    pub approvals: Vec<ApprovalSlot>,
    #[schema(example = 12)]
    pub requested_by: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<u64>,
    pub cancel_reason: Option<String>,
    pub version: u32,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl CorrectionRequest {
    /// Level that may act next, `None` once the request is terminal.
    pub fn next_level(&self) -> Option<u8> {
        match self.status {
            CorrectionStatus::Pending => Some(1),
            CorrectionStatus::Approved { level } if level < self.levels => Some(level + 1),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_level().is_none()
    }

    pub fn is_materialized(&self) -> bool {
        self.status == CorrectionStatus::Approved { level: self.levels }
    }

    pub fn slot_mut(&mut self, level: u8) -> Option<&mut ApprovalSlot> {
        self.approvals.iter_mut().find(|s| s.level == level)
    }

    /// Requested times placed on the target date.
    pub fn requested_clock_events(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        (
            self.requested_clock_in.map(|t| self.work_date.and_time(t)),
            self.requested_clock_out.map(|t| self.work_date.and_time(t)),
        )
    }

    pub fn audit_key(&self) -> String {
        self.id.to_string()
    }
}
