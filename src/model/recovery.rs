use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecoveryPeriod {
    pub id: u64,
    #[schema(example = "Ramadan 2026")]
    pub name: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecoveryKind {
    /// Hours are owed for this date; nobody works it.
    DayOff,
    /// Owed hours are recovered on this date.
    Workday,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecoveryDeclaration {
    pub id: u64,
    pub period_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub kind: RecoveryKind,
    /// Working hours for a recovery workday that falls outside the weekly schedule.
    #[schema(value_type = Option<String>, format = "time")]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub end_time: Option<NaiveTime>,
    /// Empty means every employee.
    pub employee_ids: Vec<u64>,
}

impl RecoveryDeclaration {
    pub fn targets(&self, employee_id: u64) -> bool {
        self.employee_ids.is_empty() || self.employee_ids.contains(&employee_id)
    }
}

/// Per-employee materialization of a declaration; unique per (declaration, employee).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeRecovery {
    pub declaration_id: u64,
    pub employee_id: u64,
    pub presence_expected: bool,
    pub presence_observed: bool,
    pub deduction_minutes: i64,
}

/// Recovery facts for one employee-date as seen by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryInfo {
    pub is_day_off: bool,
    pub is_recovery_workday: bool,
    pub presence_expected: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl RecoveryInfo {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_declaration(decl: &RecoveryDeclaration, ledger: Option<&EmployeeRecovery>) -> Self {
        Self {
            is_day_off: decl.kind == RecoveryKind::DayOff,
            is_recovery_workday: decl.kind == RecoveryKind::Workday,
            presence_expected: ledger.map(|l| l.presence_expected).unwrap_or(true),
            start_time: decl.start_time,
            end_time: decl.end_time,
        }
    }
}
