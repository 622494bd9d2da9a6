use chrono::{Datelike, NaiveDate, Utc};
use tracing::info;

use crate::engine::audit::AuditLog;
use crate::engine::error::{EngineError, Result};
use crate::engine::{Actor, AttendanceEngine, SCHEDULE_TABLE};
use crate::model::audit::AuditAction;
use crate::model::schedule::{DayWindow, ScheduleInfo, WorkSchedule};
use crate::store::NewSchedule;

/// Window for `date`'s weekday. A weekday with only one bound is malformed.
pub fn schedule_info(schedule: &WorkSchedule, date: NaiveDate) -> Result<ScheduleInfo> {
    let window = schedule.window(date.weekday());
    match (window.start, window.end) {
        (None, None) => Ok(ScheduleInfo::non_working()),
        (Some(start), Some(end)) => Ok(ScheduleInfo {
            scheduled_start: Some(start),
            scheduled_end: Some(end),
            scheduled_break_minutes: schedule.break_minutes,
            is_working_day: true,
        }),
        _ => Err(EngineError::Configuration(format!(
            "schedule {} has a half-defined window on {}",
            schedule.id,
            date.weekday()
        ))),
    }
}

fn validate_days(days: &[DayWindow; 7], break_minutes: i64) -> Result<()> {
    if break_minutes < 0 {
        return Err(EngineError::InvalidInput("break_minutes cannot be negative".into()));
    }
    for (i, day) in days.iter().enumerate() {
        match (day.start, day.end) {
            (None, None) => {}
            (Some(s), Some(e)) if s < e => {
                if day.minutes() < break_minutes {
                    return Err(EngineError::InvalidInput(format!(
                        "day {} is shorter than the break",
                        i
                    )));
                }
            }
            (Some(_), Some(_)) => {
                return Err(EngineError::InvalidInput(format!(
                    "day {} ends before it starts",
                    i
                )));
            }
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "day {} needs both start and end, or neither",
                    i
                )));
            }
        }
    }
    Ok(())
}

impl AttendanceEngine {
    /// Schedule window for one employee-date.
    ///
    /// An active employee override wins over the organization-wide schedule.
    /// Holidays and leave are not considered here.
    pub async fn resolve(&self, employee_id: u64, date: NaiveDate) -> Result<ScheduleInfo> {
        let schedule = match self.store.active_schedule(Some(employee_id)).await? {
            Some(s) => s,
            None => self
                .store
                .active_schedule(None)
                .await?
                .ok_or(EngineError::ScheduleNotFound)?,
        };
        schedule_info(&schedule, date)
    }

    /// Stores a new, inactive schedule.
    pub async fn create_schedule(
        &self,
        actor: &Actor,
        name: String,
        employee_id: Option<u64>,
        days: [DayWindow; 7],
        break_minutes: i64,
    ) -> Result<WorkSchedule> {
        actor.require_hr_or_admin()?;
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("schedule name is required".into()));
        }
        validate_days(&days, break_minutes)?;
        if let Some(id) = employee_id {
            self.store
                .employee(id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("Employee {}", id)))?;
        }

        let schedule = self
            .store
            .insert_schedule(NewSchedule {
                name: name.trim().to_string(),
                employee_id,
                days,
                break_minutes,
                weekly_minutes: WorkSchedule::compute_weekly_minutes(&days, break_minutes),
                updated_at: Utc::now(),
            })
            .await?;
        info!(schedule_id = schedule.id, ?employee_id, "Work schedule created");
        Ok(schedule)
    }

    /// Makes one schedule the only active one in its scope.
    pub async fn activate_schedule(&self, actor: &Actor, schedule_id: u64) -> Result<WorkSchedule> {
        actor.require_admin()?;
        let before = self
            .store
            .schedule(schedule_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Schedule {}", schedule_id)))?;
        let mut after = before.clone();
        after.active = true;
        after.updated_at = Utc::now();

        let audit = AuditLog::entry(
            SCHEDULE_TABLE,
            schedule_id.to_string(),
            AuditAction::ScheduleActivated,
            Some(&before),
            Some(&after),
            actor,
            None,
        )?;
        if !self.store.activate_schedule(schedule_id, audit).await? {
            return Err(EngineError::NotFound(format!("Schedule {}", schedule_id)));
        }
        info!(schedule_id, employee_id = ?before.employee_id, "Work schedule activated");
        Ok(after)
    }
}
