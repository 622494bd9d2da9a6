//! MySQL implementation of [`AttendanceStore`].
//!
//! Enum-valued columns are stored as their lowercase names and decoded on
//! read; an unknown name is a [`StoreError::Decode`], never a silent default.
//! Audit snapshots are stored as JSON text.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::prelude::FromRow;
use sqlx::{MySqlConnection, MySqlPool};

use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::{AuditLogEntry, NewAuditEntry};
use crate::model::correction::{ApprovalSlot, CorrectionRequest, CorrectionStatus};
use crate::model::employee::EmployeeProfile;
use crate::model::holiday::PublicHoliday;
use crate::model::leave::{LeaveDeclaration, LeaveStatus};
use crate::model::recovery::{EmployeeRecovery, RecoveryDeclaration, RecoveryPeriod};
use crate::model::schedule::{DayWindow, WorkSchedule};
use crate::store::{
    AttendanceStore, CorrectionCommit, CorrectionFilter, NewCorrection, NewHoliday, NewLeave,
    NewRecoveryDeclaration, NewRecoveryPeriod, NewSchedule, RecordWrite, StoreError, StoreResult,
    WriteOutcome,
};

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(table: &'static str, value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| StoreError::Decode {
        table,
        message: format!("{:?}: {}", value, e),
    })
}

fn snapshot_text(value: &Option<serde_json::Value>) -> StoreResult<Option<String>> {
    Ok(match value {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    })
}

fn snapshot_value(text: Option<String>) -> StoreResult<Option<serde_json::Value>> {
    Ok(match text {
        Some(t) => Some(serde_json::from_str(&t)?),
        None => None,
    })
}

fn name<T: AsRef<str>>(value: &T) -> &str {
    value.as_ref()
}

/// MySQL reports duplicate keys as SQLSTATE 23000.
fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23000"))
}

/* =========================
Row types
========================= */

#[derive(FromRow)]
struct ScheduleRow {
    id: u64,
    name: String,
    employee_id: Option<u64>,
    break_minutes: i64,
    weekly_minutes: i64,
    active: bool,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ScheduleDayRow {
    weekday: u8,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    leave_type: String,
    status: String,
}

impl TryFrom<LeaveRow> for LeaveDeclaration {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            start_date: row.start_date,
            end_date: row.end_date,
            leave_type: decode("leave_requests", &row.leave_type)?,
            status: decode("leave_requests", &row.status)?,
        })
    }
}

#[derive(FromRow)]
struct DeclarationRow {
    id: u64,
    period_id: u64,
    recovery_date: NaiveDate,
    kind: String,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
}

#[derive(FromRow)]
struct RecordRow {
    employee_id: u64,
    work_date: NaiveDate,
    day_status: String,
    clock_in_at: Option<NaiveDateTime>,
    clock_out_at: Option<NaiveDateTime>,
    scheduled_start: Option<NaiveTime>,
    scheduled_end: Option<NaiveTime>,
    late_minutes: i64,
    early_leave_minutes: i64,
    gross_worked_minutes: i64,
    net_worked_minutes: i64,
    overtime_minutes: i64,
    is_working_day: bool,
    is_recovery_day: bool,
    notes: String,
    version: u32,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for AttendanceDailyRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> StoreResult<Self> {
        Ok(Self {
            employee_id: row.employee_id,
            work_date: row.work_date,
            day_status: decode("attendance_daily_records", &row.day_status)?,
            clock_in_at: row.clock_in_at,
            clock_out_at: row.clock_out_at,
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            late_minutes: row.late_minutes,
            early_leave_minutes: row.early_leave_minutes,
            gross_worked_minutes: row.gross_worked_minutes,
            net_worked_minutes: row.net_worked_minutes,
            overtime_minutes: row.overtime_minutes,
            is_working_day: row.is_working_day,
            is_recovery_day: row.is_recovery_day,
            notes: row.notes,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CorrectionRow {
    id: u64,
    employee_id: u64,
    work_date: NaiveDate,
    requested_clock_in: Option<NaiveTime>,
    requested_clock_out: Option<NaiveTime>,
    reason: String,
    status: String,
    levels: u8,
    requested_by: u64,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<u64>,
    cancel_reason: Option<String>,
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ApprovalRow {
    level: u8,
    decision: Option<String>,
    approver_id: Option<u64>,
    decided_at: Option<DateTime<Utc>>,
    comment: Option<String>,
}

#[derive(FromRow)]
struct AuditRow {
    id: u64,
    table_name: String,
    record_id: String,
    action: String,
    before_snapshot: Option<String>,
    after_snapshot: Option<String>,
    actor_id: u64,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

const RECORD_COLUMNS: &str = r#"
    employee_id, work_date, day_status, clock_in_at, clock_out_at,
    scheduled_start, scheduled_end, late_minutes, early_leave_minutes,
    gross_worked_minutes, net_worked_minutes, overtime_minutes,
    is_working_day, is_recovery_day, notes, version, updated_at
"#;

const CORRECTION_COLUMNS: &str = r#"
    id, employee_id, work_date, requested_clock_in, requested_clock_out, reason,
    status, levels, requested_by, cancelled_at, cancelled_by, cancel_reason,
    version, created_at, updated_at
"#;

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

/* =========================
Connection-level helpers, shared by pool reads and transactions
========================= */

async fn insert_audit(conn: &mut MySqlConnection, entry: &NewAuditEntry) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log
            (table_name, record_id, action, before_snapshot, after_snapshot, actor_id, reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.table_name)
    .bind(&entry.record_id)
    .bind(name(&entry.action))
    .bind(snapshot_text(&entry.before)?)
    .bind(snapshot_text(&entry.after)?)
    .bind(entry.actor_id)
    .bind(&entry.reason)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn load_schedule(conn: &mut MySqlConnection, row: ScheduleRow) -> StoreResult<WorkSchedule> {
    let day_rows = sqlx::query_as::<_, ScheduleDayRow>(
        "SELECT weekday, start_time, end_time FROM work_schedule_days WHERE schedule_id = ?",
    )
    .bind(row.id)
    .fetch_all(conn)
    .await?;

    let mut days = [DayWindow::off(); 7];
    for day in day_rows {
        let slot = days.get_mut(day.weekday as usize).ok_or(StoreError::Decode {
            table: "work_schedule_days",
            message: format!("weekday {} out of range", day.weekday),
        })?;
        *slot = DayWindow {
            start: day.start_time,
            end: day.end_time,
        };
    }

    Ok(WorkSchedule {
        id: row.id,
        name: row.name,
        employee_id: row.employee_id,
        days,
        break_minutes: row.break_minutes,
        weekly_minutes: row.weekly_minutes,
        active: row.active,
        updated_at: row.updated_at,
    })
}

async fn load_targets(conn: &mut MySqlConnection, declaration_id: u64) -> StoreResult<Vec<u64>> {
    Ok(sqlx::query_scalar::<_, u64>(
        "SELECT employee_id FROM recovery_declaration_employees WHERE declaration_id = ? ORDER BY employee_id",
    )
    .bind(declaration_id)
    .fetch_all(conn)
    .await?)
}

async fn load_correction(
    conn: &mut MySqlConnection,
    row: CorrectionRow,
) -> StoreResult<CorrectionRequest> {
    let approvals = sqlx::query_as::<_, ApprovalRow>(
        r#"
        SELECT level, decision, approver_id, decided_at, comment
        FROM correction_approvals
        WHERE request_id = ?
        ORDER BY level
        "#,
    )
    .bind(row.id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(|a| -> StoreResult<ApprovalSlot> {
        Ok(ApprovalSlot {
            level: a.level,
            decision: a
                .decision
                .as_deref()
                .map(|d| decode("correction_approvals", d))
                .transpose()?,
            approver_id: a.approver_id,
            decided_at: a.decided_at,
            comment: a.comment,
        })
    })
    .collect::<StoreResult<Vec<_>>>()?;

    Ok(CorrectionRequest {
        id: row.id,
        employee_id: row.employee_id,
        work_date: row.work_date,
        requested_clock_in: row.requested_clock_in,
        requested_clock_out: row.requested_clock_out,
        reason: row.reason,
        status: decode("correction_requests", &row.status)?,
        levels: row.levels,
        approvals,
        requested_by: row.requested_by,
        cancelled_at: row.cancelled_at,
        cancelled_by: row.cancelled_by,
        cancel_reason: row.cancel_reason,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn upsert_ledger(conn: &mut MySqlConnection, ledger: &EmployeeRecovery) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO employee_recoveries
            (declaration_id, employee_id, presence_expected, presence_observed, deduction_minutes)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            presence_expected = VALUES(presence_expected),
            presence_observed = VALUES(presence_observed),
            deduction_minutes = VALUES(deduction_minutes)
        "#,
    )
    .bind(ledger.declaration_id)
    .bind(ledger.employee_id)
    .bind(ledger.presence_expected)
    .bind(ledger.presence_observed)
    .bind(ledger.deduction_minutes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Inserts or version-checks-and-updates one attendance row plus its audit
/// entry. Returns false when the expectation no longer holds.
async fn apply_record(conn: &mut MySqlConnection, write: &RecordWrite) -> StoreResult<bool> {
    let r = &write.record;
    let applied = match write.expected_version {
        None => {
            let sql = format!(
                "INSERT INTO attendance_daily_records ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                RECORD_COLUMNS
            );
            let result = sqlx::query(&sql)
                .bind(r.employee_id)
                .bind(r.work_date)
                .bind(name(&r.day_status))
                .bind(r.clock_in_at)
                .bind(r.clock_out_at)
                .bind(r.scheduled_start)
                .bind(r.scheduled_end)
                .bind(r.late_minutes)
                .bind(r.early_leave_minutes)
                .bind(r.gross_worked_minutes)
                .bind(r.net_worked_minutes)
                .bind(r.overtime_minutes)
                .bind(r.is_working_day)
                .bind(r.is_recovery_day)
                .bind(&r.notes)
                .bind(r.version)
                .bind(r.updated_at)
                .execute(&mut *conn)
                .await;
            match result {
                Ok(_) => true,
                Err(e) if is_duplicate(&e) => false,
                Err(e) => return Err(e.into()),
            }
        }
        Some(expected) => {
            sqlx::query(
                r#"
                UPDATE attendance_daily_records
                SET day_status = ?, clock_in_at = ?, clock_out_at = ?,
                    scheduled_start = ?, scheduled_end = ?,
                    late_minutes = ?, early_leave_minutes = ?,
                    gross_worked_minutes = ?, net_worked_minutes = ?, overtime_minutes = ?,
                    is_working_day = ?, is_recovery_day = ?, notes = ?,
                    version = ?, updated_at = ?
                WHERE employee_id = ?
                AND work_date = ?
                AND version = ?
                "#,
            )
            .bind(name(&r.day_status))
            .bind(r.clock_in_at)
            .bind(r.clock_out_at)
            .bind(r.scheduled_start)
            .bind(r.scheduled_end)
            .bind(r.late_minutes)
            .bind(r.early_leave_minutes)
            .bind(r.gross_worked_minutes)
            .bind(r.net_worked_minutes)
            .bind(r.overtime_minutes)
            .bind(r.is_working_day)
            .bind(r.is_recovery_day)
            .bind(&r.notes)
            .bind(r.version)
            .bind(r.updated_at)
            .bind(r.employee_id)
            .bind(r.work_date)
            .bind(expected)
            .execute(&mut *conn)
            .await?
            .rows_affected()
                == 1
        }
    };
    if applied {
        insert_audit(conn, &write.audit).await?;
        if let Some(ledger) = &write.ledger {
            upsert_ledger(conn, ledger).await?;
        }
    }
    Ok(applied)
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<EmployeeProfile>> {
        let row = sqlx::query_as::<_, (u64, String, bool)>(
            "SELECT id, status, clock_required FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, status, clock_required)| EmployeeProfile {
            id,
            status,
            clock_required,
        }))
    }

    async fn tracked_employees(&self) -> StoreResult<Vec<u64>> {
        Ok(sqlx::query_scalar::<_, u64>(
            "SELECT id FROM employees WHERE status = 'active' AND clock_required = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn settings(&self) -> StoreResult<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT setting_key, setting_value FROM attendance_settings",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn active_schedule(&self, employee_id: Option<u64>) -> StoreResult<Option<WorkSchedule>> {
        let mut conn = self.pool.acquire().await?;
        // `<=>` is NULL-safe, so `None` selects the organization-wide scope.
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, name, employee_id, break_minutes, weekly_minutes, active, updated_at
            FROM work_schedules
            WHERE employee_id <=> ?
            AND active = 1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?;
        match row {
            Some(row) => Ok(Some(load_schedule(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn schedule(&self, schedule_id: u64) -> StoreResult<Option<WorkSchedule>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, name, employee_id, break_minutes, weekly_minutes, active, updated_at
            FROM work_schedules
            WHERE id = ?
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(&mut *conn)
        .await?;
        match row {
            Some(row) => Ok(Some(load_schedule(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> StoreResult<WorkSchedule> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO work_schedules
                (name, employee_id, break_minutes, weekly_minutes, active, updated_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&schedule.name)
        .bind(schedule.employee_id)
        .bind(schedule.break_minutes)
        .bind(schedule.weekly_minutes)
        .bind(schedule.updated_at)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        for (weekday, day) in schedule.days.iter().enumerate() {
            sqlx::query(
                "INSERT INTO work_schedule_days (schedule_id, weekday, start_time, end_time) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(weekday as u8)
            .bind(day.start)
            .bind(day.end)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(WorkSchedule {
            id,
            name: schedule.name,
            employee_id: schedule.employee_id,
            days: schedule.days,
            break_minutes: schedule.break_minutes,
            weekly_minutes: schedule.weekly_minutes,
            active: false,
            updated_at: schedule.updated_at,
        })
    }

    async fn activate_schedule(&self, schedule_id: u64, audit: NewAuditEntry) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let scope = sqlx::query_scalar::<_, Option<u64>>(
            "SELECT employee_id FROM work_schedules WHERE id = ? FOR UPDATE",
        )
        .bind(schedule_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(scope) = scope else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE work_schedules
            SET active = (id = ?), updated_at = ?
            WHERE employee_id <=> ?
            AND (active = 1 OR id = ?)
            "#,
        )
        .bind(schedule_id)
        .bind(audit.created_at)
        .bind(scope)
        .bind(schedule_id)
        .execute(&mut *tx)
        .await?;
        insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn holidays_on(&self, date: NaiveDate) -> StoreResult<Vec<PublicHoliday>> {
        let rows = sqlx::query_as::<_, (u64, NaiveDate, String, bool)>(
            r#"
            SELECT id, holiday_date, name, recurring
            FROM public_holidays
            WHERE holiday_date = ?
            OR (recurring = 1 AND holiday_date <= ? AND MONTH(holiday_date) = ? AND DAY(holiday_date) = ?)
            "#,
        )
        .bind(date)
        .bind(date)
        .bind(chrono::Datelike::month(&date))
        .bind(chrono::Datelike::day(&date))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, date, name, recurring)| PublicHoliday {
                id,
                date,
                name,
                recurring,
            })
            .filter(|h| h.falls_on(date))
            .collect())
    }

    async fn insert_holiday(&self, holiday: NewHoliday) -> StoreResult<PublicHoliday> {
        let id = sqlx::query(
            "INSERT INTO public_holidays (holiday_date, name, recurring) VALUES (?, ?, ?)",
        )
        .bind(holiday.date)
        .bind(&holiday.name)
        .bind(holiday.recurring)
        .execute(&self.pool)
        .await?
        .last_insert_id();
        Ok(PublicHoliday {
            id,
            date: holiday.date,
            name: holiday.name,
            recurring: holiday.recurring,
        })
    }

    async fn holiday(&self, holiday_id: u64) -> StoreResult<Option<PublicHoliday>> {
        let row = sqlx::query_as::<_, (u64, NaiveDate, String, bool)>(
            "SELECT id, holiday_date, name, recurring FROM public_holidays WHERE id = ?",
        )
        .bind(holiday_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, date, name, recurring)| PublicHoliday {
            id,
            date,
            name,
            recurring,
        }))
    }

    async fn update_holiday(
        &self,
        expected: &PublicHoliday,
        holiday: PublicHoliday,
        audit: NewAuditEntry,
    ) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, (u64, NaiveDate, String, bool)>(
            "SELECT id, holiday_date, name, recurring FROM public_holidays WHERE id = ? FOR UPDATE",
        )
        .bind(holiday.id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|(id, date, name, recurring)| PublicHoliday {
            id,
            date,
            name,
            recurring,
        });
        if current.as_ref() != Some(expected) {
            return Ok(WriteOutcome::Conflict);
        }

        sqlx::query(
            "UPDATE public_holidays SET holiday_date = ?, name = ?, recurring = ? WHERE id = ?",
        )
        .bind(holiday.date)
        .bind(&holiday.name)
        .bind(holiday.recurring)
        .bind(holiday.id)
        .execute(&mut *tx)
        .await?;
        insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(WriteOutcome::Written)
    }

    async fn approved_leave_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveDeclaration>> {
        sqlx::query_as::<_, LeaveRow>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, status
            FROM leave_requests
            WHERE employee_id = ?
            AND status = 'approved'
            AND start_date <= ?
            AND end_date >= ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .map(LeaveDeclaration::try_from)
        .transpose()
    }

    async fn leave(&self, leave_id: u64) -> StoreResult<Option<LeaveDeclaration>> {
        sqlx::query_as::<_, LeaveRow>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, status
            FROM leave_requests
            WHERE id = ?
            "#,
        )
        .bind(leave_id)
        .fetch_optional(&self.pool)
        .await?
        .map(LeaveDeclaration::try_from)
        .transpose()
    }

    async fn insert_leave(&self, leave: NewLeave) -> StoreResult<LeaveDeclaration> {
        let id = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, start_date, end_date, leave_type)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(leave.employee_id)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(name(&leave.leave_type))
        .execute(&self.pool)
        .await?
        .last_insert_id();
        Ok(LeaveDeclaration {
            id,
            employee_id: leave.employee_id,
            start_date: leave.start_date,
            end_date: leave.end_date,
            leave_type: leave.leave_type,
            status: LeaveStatus::Pending,
        })
    }

    async fn set_leave_status(
        &self,
        leave_id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(name(&to))
        .bind(leave_id)
        .bind(name(&from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_recovery_period(&self, period: NewRecoveryPeriod) -> StoreResult<RecoveryPeriod> {
        let id = sqlx::query(
            "INSERT INTO recovery_periods (name, start_date, end_date) VALUES (?, ?, ?)",
        )
        .bind(&period.name)
        .bind(period.start_date)
        .bind(period.end_date)
        .execute(&self.pool)
        .await?
        .last_insert_id();
        Ok(RecoveryPeriod {
            id,
            name: period.name,
            start_date: period.start_date,
            end_date: period.end_date,
        })
    }

    async fn recovery_period(&self, period_id: u64) -> StoreResult<Option<RecoveryPeriod>> {
        let row = sqlx::query_as::<_, (u64, String, NaiveDate, NaiveDate)>(
            "SELECT id, name, start_date, end_date FROM recovery_periods WHERE id = ?",
        )
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, start_date, end_date)| RecoveryPeriod {
            id,
            name,
            start_date,
            end_date,
        }))
    }

    async fn insert_recovery_declaration(
        &self,
        declaration: NewRecoveryDeclaration,
    ) -> StoreResult<RecoveryDeclaration> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO recovery_declarations
                (period_id, recovery_date, kind, start_time, end_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(declaration.period_id)
        .bind(declaration.date)
        .bind(name(&declaration.kind))
        .bind(declaration.start_time)
        .bind(declaration.end_time)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        for employee_id in &declaration.employee_ids {
            sqlx::query(
                "INSERT INTO recovery_declaration_employees (declaration_id, employee_id) VALUES (?, ?)",
            )
            .bind(id)
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
        }
        for employee_id in &declaration.exempt_employee_ids {
            sqlx::query(
                r#"
                INSERT INTO employee_recoveries
                    (declaration_id, employee_id, presence_expected, presence_observed, deduction_minutes)
                VALUES (?, ?, 0, 0, 0)
                "#,
            )
            .bind(id)
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(RecoveryDeclaration {
            id,
            period_id: declaration.period_id,
            date: declaration.date,
            kind: declaration.kind,
            start_time: declaration.start_time,
            end_time: declaration.end_time,
            employee_ids: declaration.employee_ids,
        })
    }

    async fn recovery_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<(RecoveryDeclaration, Option<EmployeeRecovery>)>> {
        let mut conn = self.pool.acquire().await?;
        // a declaration without target rows applies to everyone
        let row = sqlx::query_as::<_, DeclarationRow>(
            r#"
            SELECT d.id, d.period_id, d.recovery_date, d.kind, d.start_time, d.end_time
            FROM recovery_declarations d
            WHERE d.recovery_date = ?
            AND (
                NOT EXISTS (SELECT 1 FROM recovery_declaration_employees t WHERE t.declaration_id = d.id)
                OR EXISTS (
                    SELECT 1 FROM recovery_declaration_employees t
                    WHERE t.declaration_id = d.id AND t.employee_id = ?
                )
            )
            ORDER BY d.id DESC
            LIMIT 1
            "#,
        )
        .bind(date)
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let declaration = RecoveryDeclaration {
            id: row.id,
            period_id: row.period_id,
            date: row.recovery_date,
            kind: decode("recovery_declarations", &row.kind)?,
            start_time: row.start_time,
            end_time: row.end_time,
            employee_ids: load_targets(&mut conn, row.id).await?,
        };
        let ledger = sqlx::query_as::<_, (bool, bool, i64)>(
            r#"
            SELECT presence_expected, presence_observed, deduction_minutes
            FROM employee_recoveries
            WHERE declaration_id = ?
            AND employee_id = ?
            "#,
        )
        .bind(row.id)
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(
            |(presence_expected, presence_observed, deduction_minutes)| EmployeeRecovery {
                declaration_id: row.id,
                employee_id,
                presence_expected,
                presence_observed,
                deduction_minutes,
            },
        );
        Ok(Some((declaration, ledger)))
    }

    async fn upsert_employee_recovery(&self, ledger: EmployeeRecovery) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_ledger(&mut conn, &ledger).await
    }

    async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceDailyRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance_daily_records WHERE employee_id = ? AND work_date = ?",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceDailyRecord::try_from)
            .transpose()
    }

    async fn write_record(&self, write: RecordWrite) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await?;
        if !apply_record(&mut tx, &write).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Conflict);
        }
        tx.commit().await?;
        Ok(WriteOutcome::Written)
    }

    async fn insert_correction(
        &self,
        correction: NewCorrection,
        mut audit: NewAuditEntry,
    ) -> StoreResult<Option<CorrectionRequest>> {
        let mut tx = self.pool.begin().await?;
        let status = CorrectionStatus::Pending;
        let inserted = sqlx::query(
            r#"
            INSERT INTO correction_requests
                (employee_id, work_date, requested_clock_in, requested_clock_out, reason,
                 status, levels, requested_by, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(correction.employee_id)
        .bind(correction.work_date)
        .bind(correction.requested_clock_in)
        .bind(correction.requested_clock_out)
        .bind(&correction.reason)
        .bind(status.to_string())
        .bind(correction.levels)
        .bind(correction.requested_by)
        .bind(correction.created_at)
        .bind(correction.created_at)
        .execute(&mut *tx)
        .await;
        // uq_correction_requests_open: another open request for this employee-date
        let id = match inserted {
            Ok(result) => result.last_insert_id(),
            Err(e) if is_duplicate(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        for level in 1..=correction.levels {
            sqlx::query("INSERT INTO correction_approvals (request_id, level) VALUES (?, ?)")
                .bind(id)
                .bind(level)
                .execute(&mut *tx)
                .await?;
        }

        let stored = CorrectionRequest {
            id,
            employee_id: correction.employee_id,
            work_date: correction.work_date,
            requested_clock_in: correction.requested_clock_in,
            requested_clock_out: correction.requested_clock_out,
            reason: correction.reason,
            status,
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
        insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn correction(&self, request_id: u64) -> StoreResult<Option<CorrectionRequest>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {} FROM correction_requests WHERE id = ?",
            CORRECTION_COLUMNS
        );
        let row = sqlx::query_as::<_, CorrectionRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_correction(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn open_correction(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<CorrectionRequest>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            r#"
            SELECT {}
            FROM correction_requests
            WHERE employee_id = ?
            AND work_date = ?
            AND status NOT IN ('rejected', 'admin_cancelled')
            AND status <> CONCAT('n', levels, '_approved')
            ORDER BY id DESC
            LIMIT 1
            "#,
            CORRECTION_COLUMNS
        );
        let row = sqlx::query_as::<_, CorrectionRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_correction(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn list_corrections(
        &self,
        filter: &CorrectionFilter,
    ) -> StoreResult<(Vec<CorrectionRequest>, i64)> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(employee_id) = filter.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(employee_id));
        }
        if let Some(status) = filter.status.as_deref() {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status));
        }

        let count_sql = format!("SELECT COUNT(*) FROM correction_requests{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Str(s) => count_q.bind(*s),
            };
        }
        let mut conn = self.pool.acquire().await?;
        let total = count_q.fetch_one(&mut *conn).await?;

        let per_page = filter.per_page.clamp(1, 100);
        let offset = (filter.page.max(1) - 1) * per_page;
        let data_sql = format!(
            r#"
            SELECT {}
            FROM correction_requests
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            CORRECTION_COLUMNS, where_sql
        );
        let mut data_q = sqlx::query_as::<_, CorrectionRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
            };
        }
        let rows = data_q
            .bind(per_page)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            requests.push(load_correction(&mut conn, row).await?);
        }
        Ok((requests, total))
    }

    async fn commit_correction(&self, commit: CorrectionCommit) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await?;
        let request = &commit.request;

        let current = sqlx::query_as::<_, (u32, String)>(
            "SELECT version, status FROM correction_requests WHERE id = ? FOR UPDATE",
        )
        .bind(request.id)
        .fetch_optional(&mut *tx)
        .await?;
        let fresh = match current {
            Some((version, status)) => {
                version == commit.expected_version
                    && decode::<CorrectionStatus>("correction_requests", &status)?
                        == commit.expected_status
            }
            None => false,
        };
        if !fresh {
            tx.rollback().await?;
            return Ok(WriteOutcome::Conflict);
        }

        sqlx::query(
            r#"
            UPDATE correction_requests
            SET status = ?, cancelled_at = ?, cancelled_by = ?, cancel_reason = ?,
                version = ?, updated_at = ?
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(request.status.to_string())
        .bind(request.cancelled_at)
        .bind(request.cancelled_by)
        .bind(&request.cancel_reason)
        .bind(request.version)
        .bind(request.updated_at)
        .bind(request.id)
        .bind(commit.expected_version)
        .execute(&mut *tx)
        .await?;

        for slot in request.approvals.iter().filter(|s| s.decision.is_some()) {
            sqlx::query(
                r#"
                UPDATE correction_approvals
                SET decision = ?, approver_id = ?, decided_at = ?, comment = ?
                WHERE request_id = ?
                AND level = ?
                "#,
            )
            .bind(slot.decision.as_ref().map(name))
            .bind(slot.approver_id)
            .bind(slot.decided_at)
            .bind(&slot.comment)
            .bind(request.id)
            .bind(slot.level)
            .execute(&mut *tx)
            .await?;
        }
        insert_audit(&mut tx, &commit.audit).await?;

        if let Some(write) = &commit.record {
            if !apply_record(&mut tx, write).await? {
                tx.rollback().await?;
                return Ok(WriteOutcome::Conflict);
            }
        }
        tx.commit().await?;
        Ok(WriteOutcome::Written)
    }

    async fn audit_trail(&self, table_name: &str, record_id: &str) -> StoreResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, table_name, record_id, action, before_snapshot, after_snapshot,
                   actor_id, reason, created_at
            FROM audit_log
            WHERE table_name = ?
            AND record_id = ?
            ORDER BY id
            "#,
        )
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> StoreResult<AuditLogEntry> {
                Ok(AuditLogEntry {
                    id: row.id,
                    action: decode("audit_log", &row.action)?,
                    before: snapshot_value(row.before_snapshot)?,
                    after: snapshot_value(row.after_snapshot)?,
                    table_name: row.table_name,
                    record_id: row.record_id,
                    actor_id: row.actor_id,
                    reason: row.reason,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::day_status::DayStatus;

    #[test]
    fn unknown_enum_names_fail_to_decode() {
        let err = decode::<DayStatus>("attendance_daily_records", "half_day").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Decode {
                table: "attendance_daily_records",
                ..
            }
        ));
        let ok: CorrectionStatus = decode("correction_requests", "n2_approved").unwrap();
        assert_eq!(ok, CorrectionStatus::Approved { level: 2 });
    }

    #[test]
    fn snapshots_survive_the_text_column() {
        let value = Some(serde_json::json!({"day_status": "partial", "net_worked_minutes": 150}));
        let text = snapshot_text(&value).unwrap();
        assert_eq!(snapshot_value(text).unwrap(), value);
        assert_eq!(snapshot_value(None).unwrap(), None);
    }
}
