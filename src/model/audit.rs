use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    Create,
    Classify,
    AdminEdit,
    Resync,
    CorrectionFiled,
    CorrectionApproved,
    CorrectionRejected,
    CorrectionCancelled,
    CorrectionApplied,
    CorrectionReverted,
    ScheduleActivated,
    HolidayUpdated,
}

/// An audit row about to be appended, committed with the mutation it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub table_name: &'static str,
    pub record_id: String,
    pub action: AuditAction,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub actor_id: u64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: u64,
    #[schema(example = "attendance_daily_records")]
    pub table_name: String,
    #[schema(example = "1000:2026-01-05")]
    pub record_id: String,
    pub action: AuditAction,
    #[schema(value_type = Option<Object>)]
    pub before: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub after: Option<serde_json::Value>,
    pub actor_id: u64,
    pub reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
