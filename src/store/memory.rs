//! In-memory store for engine tests.
//!
//! A single mutex around the whole state makes every method atomic, which
//! gives the same all-or-nothing behavior the MySQL transactions provide.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::{AuditLogEntry, NewAuditEntry};
use crate::model::correction::{ApprovalSlot, CorrectionRequest, CorrectionStatus};
use crate::model::employee::EmployeeProfile;
use crate::model::holiday::PublicHoliday;
use crate::model::leave::{LeaveDeclaration, LeaveStatus};
use crate::model::recovery::{EmployeeRecovery, RecoveryDeclaration, RecoveryPeriod};
use crate::model::schedule::WorkSchedule;
use crate::store::{
    AttendanceStore, CorrectionCommit, CorrectionFilter, NewCorrection, NewHoliday, NewLeave,
    NewRecoveryDeclaration, NewRecoveryPeriod, NewSchedule, RecordWrite, StoreResult,
    WriteOutcome,
};

#[derive(Default)]
struct State {
    next_id: u64,
    employees: BTreeMap<u64, EmployeeProfile>,
    settings: HashMap<String, String>,
    schedules: BTreeMap<u64, WorkSchedule>,
    holidays: Vec<PublicHoliday>,
    leaves: BTreeMap<u64, LeaveDeclaration>,
    periods: BTreeMap<u64, RecoveryPeriod>,
    declarations: BTreeMap<u64, RecoveryDeclaration>,
    ledger: BTreeMap<(u64, u64), EmployeeRecovery>,
    records: BTreeMap<(u64, NaiveDate), AttendanceDailyRecord>,
    corrections: BTreeMap<u64, CorrectionRequest>,
    audit: Vec<AuditLogEntry>,
    /// Employees whose record reads fail, to exercise batch error handling.
    failing_employees: Vec<u64>,
    /// Ledger upserts fail, to check that record writes roll back with them.
    failing_ledger: bool,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn append_audit(&mut self, entry: NewAuditEntry) {
        let id = self.id();
        self.audit.push(AuditLogEntry {
            id,
            table_name: entry.table_name.to_string(),
            record_id: entry.record_id,
            action: entry.action,
            before: entry.before,
            after: entry.after,
            actor_id: entry.actor_id,
            reason: entry.reason,
            created_at: entry.created_at,
        });
    }

    fn record_version_matches(&self, write: &RecordWrite) -> bool {
        let key = (write.record.employee_id, write.record.work_date);
        self.records.get(&key).map(|r| r.version) == write.expected_version
    }

    fn check_ledger(&self, write: &RecordWrite) -> StoreResult<()> {
        if self.failing_ledger && write.ledger.is_some() {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(())
    }

    fn apply_record(&mut self, write: RecordWrite) {
        let key = (write.record.employee_id, write.record.work_date);
        self.records.insert(key, write.record);
        self.append_audit(write.audit);
        if let Some(ledger) = write.ledger {
            self.ledger
                .insert((ledger.declaration_id, ledger.employee_id), ledger);
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_employee(&self, id: u64, clock_required: bool) {
        self.state.lock().await.employees.insert(
            id,
            EmployeeProfile {
                id,
                status: "active".to_string(),
                clock_required,
            },
        );
    }

    pub async fn set_setting(&self, key: &str, value: &str) {
        self.state
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
    }

    pub async fn put_record(&self, record: AttendanceDailyRecord) {
        self.state
            .lock()
            .await
            .records
            .insert((record.employee_id, record.work_date), record);
    }

    pub async fn fail_reads_for(&self, employee_id: u64) {
        self.state.lock().await.failing_employees.push(employee_id);
    }

    pub async fn fail_ledger_writes(&self) {
        self.state.lock().await.failing_ledger = true;
    }

    pub async fn ledger_row(&self, declaration_id: u64, employee_id: u64) -> Option<EmployeeRecovery> {
        self.state
            .lock()
            .await
            .ledger
            .get(&(declaration_id, employee_id))
            .cloned()
    }

    pub async fn audit_len(&self) -> usize {
        self.state.lock().await.audit.len()
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<EmployeeProfile>> {
        Ok(self.state.lock().await.employees.get(&employee_id).cloned())
    }

    async fn tracked_employees(&self) -> StoreResult<Vec<u64>> {
        Ok(self
            .state
            .lock()
            .await
            .employees
            .values()
            .filter(|e| e.is_tracked())
            .map(|e| e.id)
            .collect())
    }

    async fn settings(&self) -> StoreResult<HashMap<String, String>> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn active_schedule(&self, employee_id: Option<u64>) -> StoreResult<Option<WorkSchedule>> {
        Ok(self
            .state
            .lock()
            .await
            .schedules
            .values()
            .find(|s| s.active && s.employee_id == employee_id)
            .cloned())
    }

    async fn schedule(&self, schedule_id: u64) -> StoreResult<Option<WorkSchedule>> {
        Ok(self.state.lock().await.schedules.get(&schedule_id).cloned())
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> StoreResult<WorkSchedule> {
        let mut state = self.state.lock().await;
        let id = state.id();
        let stored = WorkSchedule {
            id,
            name: schedule.name,
            employee_id: schedule.employee_id,
            days: schedule.days,
            break_minutes: schedule.break_minutes,
            weekly_minutes: schedule.weekly_minutes,
            active: false,
            updated_at: schedule.updated_at,
        };
        state.schedules.insert(id, stored.clone());
        Ok(stored)
    }

    async fn activate_schedule(&self, schedule_id: u64, audit: NewAuditEntry) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let scope = match state.schedules.get(&schedule_id) {
            Some(s) => s.employee_id,
            None => return Ok(false),
        };
        for s in state.schedules.values_mut() {
            if s.employee_id == scope {
                s.active = s.id == schedule_id;
            }
        }
        state.append_audit(audit);
        Ok(true)
    }

    async fn holidays_on(&self, date: NaiveDate) -> StoreResult<Vec<PublicHoliday>> {
        Ok(self
            .state
            .lock()
            .await
            .holidays
            .iter()
            .filter(|h| h.falls_on(date))
            .cloned()
            .collect())
    }

    async fn insert_holiday(&self, holiday: NewHoliday) -> StoreResult<PublicHoliday> {
        let mut state = self.state.lock().await;
        let id = state.id();
        let stored = PublicHoliday {
            id,
            date: holiday.date,
            name: holiday.name,
            recurring: holiday.recurring,
        };
        state.holidays.push(stored.clone());
        Ok(stored)
    }

    async fn holiday(&self, holiday_id: u64) -> StoreResult<Option<PublicHoliday>> {
        Ok(self
            .state
            .lock()
            .await
            .holidays
            .iter()
            .find(|h| h.id == holiday_id)
            .cloned())
    }

    async fn update_holiday(
        &self,
        expected: &PublicHoliday,
        holiday: PublicHoliday,
        audit: NewAuditEntry,
    ) -> StoreResult<WriteOutcome> {
        let mut state = self.state.lock().await;
        match state.holidays.iter_mut().find(|h| h.id == holiday.id) {
            Some(stored) if stored == expected => *stored = holiday,
            _ => return Ok(WriteOutcome::Conflict),
        }
        state.append_audit(audit);
        Ok(WriteOutcome::Written)
    }

    async fn approved_leave_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveDeclaration>> {
        Ok(self
            .state
            .lock()
            .await
            .leaves
            .values()
            .find(|l| l.employee_id == employee_id && l.covers(date))
            .cloned())
    }

    async fn leave(&self, leave_id: u64) -> StoreResult<Option<LeaveDeclaration>> {
        Ok(self.state.lock().await.leaves.get(&leave_id).cloned())
    }

    async fn insert_leave(&self, leave: NewLeave) -> StoreResult<LeaveDeclaration> {
        let mut state = self.state.lock().await;
        let id = state.id();
        let stored = LeaveDeclaration {
            id,
            employee_id: leave.employee_id,
            start_date: leave.start_date,
            end_date: leave.end_date,
            leave_type: leave.leave_type,
            status: LeaveStatus::Pending,
        };
        state.leaves.insert(id, stored.clone());
        Ok(stored)
    }

    async fn set_leave_status(
        &self,
        leave_id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.leaves.get_mut(&leave_id) {
            Some(l) if l.status == from => {
                l.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_recovery_period(&self, period: NewRecoveryPeriod) -> StoreResult<RecoveryPeriod> {
        let mut state = self.state.lock().await;
        let id = state.id();
        let stored = RecoveryPeriod {
            id,
            name: period.name,
            start_date: period.start_date,
            end_date: period.end_date,
        };
        state.periods.insert(id, stored.clone());
        Ok(stored)
    }

    async fn recovery_period(&self, period_id: u64) -> StoreResult<Option<RecoveryPeriod>> {
        Ok(self.state.lock().await.periods.get(&period_id).cloned())
    }

    async fn insert_recovery_declaration(
        &self,
        declaration: NewRecoveryDeclaration,
    ) -> StoreResult<RecoveryDeclaration> {
        let mut state = self.state.lock().await;
        let id = state.id();
        let stored = RecoveryDeclaration {
            id,
            period_id: declaration.period_id,
            date: declaration.date,
            kind: declaration.kind,
            start_time: declaration.start_time,
            end_time: declaration.end_time,
            employee_ids: declaration.employee_ids,
        };
        for employee_id in declaration.exempt_employee_ids {
            state.ledger.insert(
                (id, employee_id),
                EmployeeRecovery {
                    declaration_id: id,
                    employee_id,
                    presence_expected: false,
                    presence_observed: false,
                    deduction_minutes: 0,
                },
            );
        }
        state.declarations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn recovery_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<(RecoveryDeclaration, Option<EmployeeRecovery>)>> {
        let state = self.state.lock().await;
        Ok(state
            .declarations
            .values()
            .rev()
            .find(|d| d.date == date && d.targets(employee_id))
            .map(|d| (d.clone(), state.ledger.get(&(d.id, employee_id)).cloned())))
    }

    async fn upsert_employee_recovery(&self, ledger: EmployeeRecovery) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.failing_ledger {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        state
            .ledger
            .insert((ledger.declaration_id, ledger.employee_id), ledger);
        Ok(())
    }

    async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceDailyRecord>> {
        let state = self.state.lock().await;
        if state.failing_employees.contains(&employee_id) {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(state.records.get(&(employee_id, date)).cloned())
    }

    async fn write_record(&self, write: RecordWrite) -> StoreResult<WriteOutcome> {
        let mut state = self.state.lock().await;
        if !state.record_version_matches(&write) {
            return Ok(WriteOutcome::Conflict);
        }
        state.check_ledger(&write)?;
        state.apply_record(write);
        Ok(WriteOutcome::Written)
    }

    async fn insert_correction(
        &self,
        correction: NewCorrection,
        mut audit: NewAuditEntry,
    ) -> StoreResult<Option<CorrectionRequest>> {
        let mut state = self.state.lock().await;
        if state.corrections.values().any(|c| {
            c.employee_id == correction.employee_id
                && c.work_date == correction.work_date
                && !c.is_terminal()
        }) {
            return Ok(None);
        }
        let id = state.id();
        let stored = CorrectionRequest {
            id,
            employee_id: correction.employee_id,
            work_date: correction.work_date,
            requested_clock_in: correction.requested_clock_in,
            requested_clock_out: correction.requested_clock_out,
            reason: correction.reason,
            status: CorrectionStatus::Pending,
            levels: correction.levels,
            approvals: (1..=correction.levels).map(ApprovalSlot::open).collect(),
            requested_by: correction.requested_by,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            version: 0,
            created_at: correction.created_at,
            updated_at: correction.created_at,
        };
        audit.record_id = stored.audit_key();
        audit.after = Some(serde_json::to_value(&stored)?);
        state.corrections.insert(id, stored.clone());
        state.append_audit(audit);
        Ok(Some(stored))
    }

    async fn correction(&self, request_id: u64) -> StoreResult<Option<CorrectionRequest>> {
        Ok(self.state.lock().await.corrections.get(&request_id).cloned())
    }

    async fn open_correction(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<CorrectionRequest>> {
        Ok(self
            .state
            .lock()
            .await
            .corrections
            .values()
            .find(|c| c.employee_id == employee_id && c.work_date == date && !c.is_terminal())
            .cloned())
    }

    async fn list_corrections(
        &self,
        filter: &CorrectionFilter,
    ) -> StoreResult<(Vec<CorrectionRequest>, i64)> {
        let state = self.state.lock().await;
        let matching: Vec<_> = state
            .corrections
            .values()
            .rev()
            .filter(|c| filter.employee_id.map_or(true, |e| c.employee_id == e))
            .filter(|c| {
                filter
                    .status
                    .as_deref()
                    .map_or(true, |s| c.status.to_string() == s)
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let offset = (filter.page.max(1) - 1) * filter.per_page;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(filter.per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn commit_correction(&self, commit: CorrectionCommit) -> StoreResult<WriteOutcome> {
        let mut state = self.state.lock().await;
        let current = match state.corrections.get(&commit.request.id) {
            Some(c) => c,
            None => return Ok(WriteOutcome::Conflict),
        };
        if current.version != commit.expected_version || current.status != commit.expected_status
        {
            return Ok(WriteOutcome::Conflict);
        }
        if let Some(write) = &commit.record {
            if !state.record_version_matches(write) {
                return Ok(WriteOutcome::Conflict);
            }
            state.check_ledger(write)?;
        }
        state.corrections.insert(commit.request.id, commit.request);
        state.append_audit(commit.audit);
        if let Some(write) = commit.record {
            state.apply_record(write);
        }
        Ok(WriteOutcome::Written)
    }

    async fn audit_trail(&self, table_name: &str, record_id: &str) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .audit
            .iter()
            .filter(|a| a.table_name == table_name && a.record_id == record_id)
            .cloned()
            .collect())
    }
}
