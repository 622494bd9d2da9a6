//! Persistence seam for the attendance engine.
//!
//! Every mutating method is one transaction: the row change and its audit
//! entries commit together or not at all. Writes are compare-and-set on a
//! `version` column; a stale expectation yields [`WriteOutcome::Conflict`]
//! instead of overwriting.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::{AuditLogEntry, NewAuditEntry};
use crate::model::correction::{CorrectionRequest, CorrectionStatus};
use crate::model::employee::EmployeeProfile;
use crate::model::holiday::PublicHoliday;
use crate::model::leave::{LeaveDeclaration, LeaveStatus, LeaveType};
use crate::model::recovery::{
    EmployeeRecovery, RecoveryDeclaration, RecoveryKind, RecoveryPeriod,
};
use crate::model::schedule::{DayWindow, WorkSchedule};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row in {table}: {message}")]
    Decode { table: &'static str, message: String },

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The stored version no longer matches the expectation.
    Conflict,
}

/// A full replacement of one attendance row.
#[derive(Debug, Clone)]
pub struct RecordWrite {
    /// Version the caller read; `None` means the row must not exist yet.
    pub expected_version: Option<u32>,
    /// New row, `version` already bumped by the caller.
    pub record: AttendanceDailyRecord,
    pub audit: NewAuditEntry,
    /// Recovery ledger row that changes with this record; written in the same transaction.
    pub ledger: Option<EmployeeRecovery>,
}

/// A correction request transition, optionally with the attendance row it
/// materializes or reverts.
#[derive(Debug, Clone)]
pub struct CorrectionCommit {
    pub expected_version: u32,
    pub expected_status: CorrectionStatus,
    pub request: CorrectionRequest,
    pub audit: NewAuditEntry,
    pub record: Option<RecordWrite>,
}

#[derive(Debug, Clone)]
pub struct NewCorrection {
    pub employee_id: u64,
    pub work_date: NaiveDate,
    pub requested_clock_in: Option<NaiveTime>,
    pub requested_clock_out: Option<NaiveTime>,
    pub reason: String,
    pub levels: u8,
    pub requested_by: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrectionFilter {
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: String,
    pub employee_id: Option<u64>,
    pub days: [DayWindow; 7],
    pub break_minutes: i64,
    pub weekly_minutes: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHoliday {
    pub date: NaiveDate,
    pub name: String,
    pub recurring: bool,
}

#[derive(Debug, Clone)]
pub struct NewLeave {
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
}

#[derive(Debug, Clone)]
pub struct NewRecoveryPeriod {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewRecoveryDeclaration {
    pub period_id: u64,
    pub date: NaiveDate,
    pub kind: RecoveryKind,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub employee_ids: Vec<u64>,
    /// Targeted employees not expected to attend; ledger rows are created for them up front.
    pub exempt_employee_ids: Vec<u64>,
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    // ---------- reference data ----------
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<EmployeeProfile>>;
    /// Active employees who are required to clock.
    async fn tracked_employees(&self) -> StoreResult<Vec<u64>>;
    /// Raw key/value tolerance settings, read fresh on every call.
    async fn settings(&self) -> StoreResult<HashMap<String, String>>;

    // ---------- schedules ----------
    /// Active schedule for an employee override (`Some`) or the organization (`None`).
    async fn active_schedule(&self, employee_id: Option<u64>) -> StoreResult<Option<WorkSchedule>>;
    async fn schedule(&self, schedule_id: u64) -> StoreResult<Option<WorkSchedule>>;
    async fn insert_schedule(&self, schedule: NewSchedule) -> StoreResult<WorkSchedule>;
    /// Activates one schedule and deactivates every other in its scope, atomically.
    async fn activate_schedule(&self, schedule_id: u64, audit: NewAuditEntry) -> StoreResult<bool>;

    // ---------- calendar ----------
    async fn holidays_on(&self, date: NaiveDate) -> StoreResult<Vec<PublicHoliday>>;
    async fn insert_holiday(&self, holiday: NewHoliday) -> StoreResult<PublicHoliday>;
    async fn holiday(&self, holiday_id: u64) -> StoreResult<Option<PublicHoliday>>;
    /// Replaces a holiday if it still equals `expected`.
    async fn update_holiday(
        &self,
        expected: &PublicHoliday,
        holiday: PublicHoliday,
        audit: NewAuditEntry,
    ) -> StoreResult<WriteOutcome>;
    async fn approved_leave_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveDeclaration>>;
    async fn leave(&self, leave_id: u64) -> StoreResult<Option<LeaveDeclaration>>;
    async fn insert_leave(&self, leave: NewLeave) -> StoreResult<LeaveDeclaration>;
    /// Moves a leave from `from` to `to`; false when it was not in `from`.
    async fn set_leave_status(
        &self,
        leave_id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
    ) -> StoreResult<bool>;

    // ---------- recovery ----------
    async fn insert_recovery_period(&self, period: NewRecoveryPeriod) -> StoreResult<RecoveryPeriod>;
    async fn recovery_period(&self, period_id: u64) -> StoreResult<Option<RecoveryPeriod>>;
    async fn insert_recovery_declaration(
        &self,
        declaration: NewRecoveryDeclaration,
    ) -> StoreResult<RecoveryDeclaration>;
    /// Declaration targeting this employee on this date, with its ledger row if any.
    async fn recovery_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<(RecoveryDeclaration, Option<EmployeeRecovery>)>>;
    async fn upsert_employee_recovery(&self, ledger: EmployeeRecovery) -> StoreResult<()>;

    // ---------- attendance records ----------
    async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceDailyRecord>>;
    async fn write_record(&self, write: RecordWrite) -> StoreResult<WriteOutcome>;

    // ---------- corrections ----------
    /// Inserts a request and its filing audit entry; the entry's `record_id`
    /// and `after` are filled in from the stored request. `None` when the
    /// employee-date already has an open request.
    async fn insert_correction(
        &self,
        correction: NewCorrection,
        audit: NewAuditEntry,
    ) -> StoreResult<Option<CorrectionRequest>>;
    async fn correction(&self, request_id: u64) -> StoreResult<Option<CorrectionRequest>>;
    /// Non-terminal request for this employee-date, if one exists.
    async fn open_correction(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<CorrectionRequest>>;
    async fn list_corrections(
        &self,
        filter: &CorrectionFilter,
    ) -> StoreResult<(Vec<CorrectionRequest>, i64)>;
    async fn commit_correction(&self, commit: CorrectionCommit) -> StoreResult<WriteOutcome>;

    // ---------- audit ----------
    async fn audit_trail(&self, table_name: &str, record_id: &str) -> StoreResult<Vec<AuditLogEntry>>;
}
