use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::engine::audit::AuditLog;
use crate::engine::error::{EngineError, Result};
use crate::engine::{ATTENDANCE_TABLE, Actor, AttendanceEngine};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::AuditAction;
use crate::store::{RecordWrite, WriteOutcome};

impl AttendanceEngine {
    pub async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceDailyRecord>> {
        Ok(self.store.record(employee_id, date).await?)
    }

    /// Self-service clock-in at `at`, classified immediately.
    pub async fn clock_in(&self, actor: &Actor, at: NaiveDateTime) -> Result<AttendanceDailyRecord> {
        let employee_id = actor.own_employee_id()?;
        let date = at.date();
        let _guard = self.locks.lock(employee_id, date).await;

        let current = self.store.record(employee_id, date).await?;
        if current.as_ref().is_some_and(|r| r.clock_in_at.is_some()) {
            return Err(EngineError::InvalidInput("Already checked in today".into()));
        }
        let mut next = current
            .clone()
            .unwrap_or_else(|| AttendanceDailyRecord::blank(employee_id, date, Utc::now()));
        next.clock_in_at = Some(at);

        self.write_classified(current, next, AuditAction::Classify, actor, None)
            .await
    }

    /// Self-service clock-out at `at`; closes the open day.
    pub async fn clock_out(&self, actor: &Actor, at: NaiveDateTime) -> Result<AttendanceDailyRecord> {
        let employee_id = actor.own_employee_id()?;
        let date = at.date();
        let _guard = self.locks.lock(employee_id, date).await;

        let current = self.store.record(employee_id, date).await?;
        let mut next = match &current {
            Some(r) if r.clock_in_at.is_some() && r.clock_out_at.is_none() => r.clone(),
            _ => {
                return Err(EngineError::InvalidInput(
                    "No active check-in found for today".into(),
                ));
            }
        };
        next.clock_out_at = Some(at);

        self.write_classified(current, next, AuditAction::Classify, actor, None)
            .await
    }

    /// HR/Admin replacement of both clock events for one employee-date.
    pub async fn admin_edit(
        &self,
        actor: &Actor,
        employee_id: u64,
        date: NaiveDate,
        clock_in: Option<NaiveDateTime>,
        clock_out: Option<NaiveDateTime>,
        reason: &str,
    ) -> Result<AttendanceDailyRecord> {
        actor.require_hr_or_admin()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::InvalidInput("A reason is required".into()));
        }
        for at in [clock_in, clock_out].into_iter().flatten() {
            if at.date() != date {
                return Err(EngineError::InvalidInput(format!(
                    "clock event {} is not on {}",
                    at, date
                )));
            }
        }
        self.store
            .employee(employee_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Employee {}", employee_id)))?;

        let _guard = self.locks.lock(employee_id, date).await;
        let current = self.store.record(employee_id, date).await?;
        let mut next = current
            .clone()
            .unwrap_or_else(|| AttendanceDailyRecord::blank(employee_id, date, Utc::now()));
        next.clock_in_at = clock_in;
        next.clock_out_at = clock_out;
        next.append_note(&format!("admin edit by user {}: {}", actor.user_id, reason));

        self.write_classified(
            current,
            next,
            AuditAction::AdminEdit,
            actor,
            Some(reason.to_string()),
        )
        .await
    }

    /// Classifies `next`, writes it over `current` and records the audit entry.
    /// The caller holds the employee-date lock.
    async fn write_classified(
        &self,
        current: Option<AttendanceDailyRecord>,
        mut next: AttendanceDailyRecord,
        action: AuditAction,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<AttendanceDailyRecord> {
        let facts = self.day_facts(next.employee_id, next.work_date).await?;
        let classification = self.classify_with(&facts, &next)?;
        classification.apply_to(&mut next);
        Self::bumped(&mut next);
        let ledger = Self::recovery_ledger(&facts, &next, &classification);

        let action = if current.is_none() && action == AuditAction::Classify {
            AuditAction::Create
        } else {
            action
        };
        let audit = AuditLog::entry(
            ATTENDANCE_TABLE,
            AttendanceDailyRecord::audit_key(next.employee_id, next.work_date),
            action,
            current.as_ref(),
            Some(&next),
            actor,
            reason,
        )?;
        let write = RecordWrite {
            expected_version: current.as_ref().map(|r| r.version),
            record: next.clone(),
            audit,
            ledger,
        };

        match self.store.write_record(write).await? {
            WriteOutcome::Written => {
                info!(
                    employee_id = next.employee_id,
                    date = %next.work_date,
                    status = %next.day_status,
                    ?action,
                    "Attendance record classified"
                );
                Ok(next)
            }
            WriteOutcome::Conflict => {
                warn!(
                    employee_id = next.employee_id,
                    date = %next.work_date,
                    "Attendance record changed concurrently"
                );
                Err(EngineError::Conflict(format!(
                    "attendance record {}",
                    AttendanceDailyRecord::audit_key(next.employee_id, next.work_date)
                )))
            }
        }
    }
}
