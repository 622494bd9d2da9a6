//! Day-status classification.
//!
//! [`classify`] is a pure function of its input: no clock reads, no storage.
//! The resynchronization pass relies on that to stay idempotent, and the
//! correction workflow relies on it to materialize exactly what an
//! independent classification of the requested times would produce.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::engine::error::{EngineError, Result};
use crate::engine::tolerances::Tolerances;
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::day_status::DayStatus;
use crate::model::recovery::RecoveryInfo;
use crate::model::schedule::ScheduleInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyInput {
    pub employee_id: u64,
    pub work_date: NaiveDate,
    /// Point in time the classification is made at; decides absent vs pending.
    pub as_of: NaiveDateTime,
    pub clock_in: Option<NaiveDateTime>,
    pub clock_out: Option<NaiveDateTime>,
    pub schedule: ScheduleInfo,
    pub is_holiday: bool,
    pub on_approved_leave: bool,
    pub recovery: RecoveryInfo,
    pub tolerances: Tolerances,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: DayStatus,
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub gross_worked_minutes: i64,
    pub net_worked_minutes: i64,
    pub overtime_minutes: i64,
    pub is_working_day: bool,
    pub is_recovery_day: bool,
}

impl Classification {
    /// Copies the derived fields onto a record, leaving clock events,
    /// notes and bookkeeping untouched.
    pub fn apply_to(&self, record: &mut AttendanceDailyRecord) {
        record.day_status = self.status;
        record.scheduled_start = self.scheduled_start;
        record.scheduled_end = self.scheduled_end;
        record.late_minutes = self.late_minutes;
        record.early_leave_minutes = self.early_leave_minutes;
        record.gross_worked_minutes = self.gross_worked_minutes;
        record.net_worked_minutes = self.net_worked_minutes;
        record.overtime_minutes = self.overtime_minutes;
        record.is_working_day = self.is_working_day;
        record.is_recovery_day = self.is_recovery_day;
    }

    /// True when `record` already carries exactly this classification.
    pub fn matches(&self, record: &AttendanceDailyRecord) -> bool {
        record.day_status == self.status
            && record.scheduled_start == self.scheduled_start
            && record.scheduled_end == self.scheduled_end
            && record.late_minutes == self.late_minutes
            && record.early_leave_minutes == self.early_leave_minutes
            && record.gross_worked_minutes == self.gross_worked_minutes
            && record.net_worked_minutes == self.net_worked_minutes
            && record.overtime_minutes == self.overtime_minutes
            && record.is_working_day == self.is_working_day
            && record.is_recovery_day == self.is_recovery_day
    }
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (to - from).num_minutes()
}

pub fn classify(input: &ClassifyInput) -> Result<Classification> {
    let t = &input.tolerances;

    let worked = match (input.clock_in, input.clock_out) {
        (None, Some(_)) => {
            return Err(EngineError::InvalidInput(format!(
                "employee {} on {}: clock-out without clock-in",
                input.employee_id, input.work_date
            )));
        }
        (Some(i), Some(o)) if o < i => {
            return Err(EngineError::InvalidInput(format!(
                "employee {} on {}: clock-out {} is before clock-in {}",
                input.employee_id, input.work_date, o, i
            )));
        }
        (Some(i), Some(o)) => Some(minutes_between(i, o)),
        _ => None,
    };
    let gross = worked.unwrap_or(0);
    let net = (gross - input.schedule.scheduled_break_minutes).max(0);

    let calendar_day = |status: DayStatus| Classification {
        status,
        scheduled_start: input.schedule.scheduled_start,
        scheduled_end: input.schedule.scheduled_end,
        late_minutes: 0,
        early_leave_minutes: 0,
        gross_worked_minutes: gross,
        net_worked_minutes: net,
        overtime_minutes: 0,
        is_working_day: input.schedule.is_working_day,
        is_recovery_day: false,
    };

    // fixed precedence, first match wins
    if input.is_holiday {
        return Ok(calendar_day(DayStatus::Holiday));
    }
    if input.on_approved_leave {
        return Ok(calendar_day(DayStatus::Leave));
    }
    if input.recovery.is_day_off {
        return Ok(calendar_day(DayStatus::RecoveryOff));
    }
    let recovery_workday = input.recovery.is_recovery_workday;
    if !input.schedule.is_working_day && !recovery_workday {
        return Ok(calendar_day(DayStatus::Weekend));
    }

    let (start, end, break_minutes) = if recovery_workday {
        let start = input.recovery.start_time.or(input.schedule.scheduled_start);
        let end = input.recovery.end_time.or(input.schedule.scheduled_end);
        let brk = if input.schedule.is_working_day {
            input.schedule.scheduled_break_minutes
        } else {
            0
        };
        (start, end, brk)
    } else {
        (
            input.schedule.scheduled_start,
            input.schedule.scheduled_end,
            input.schedule.scheduled_break_minutes,
        )
    };
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(EngineError::Configuration(format!(
                "working day {} has no scheduled hours",
                input.work_date
            )));
        }
    };
    let start_at = input.work_date.and_time(start);
    let end_at = input.work_date.and_time(end);
    let net = (gross - break_minutes).max(0);

    let mut out = Classification {
        status: DayStatus::Pending,
        scheduled_start: Some(start),
        scheduled_end: Some(end),
        late_minutes: 0,
        early_leave_minutes: 0,
        gross_worked_minutes: gross,
        net_worked_minutes: net,
        overtime_minutes: 0,
        is_working_day: true,
        is_recovery_day: recovery_workday,
    };

    let clock_in = match input.clock_in {
        Some(c) => c,
        None => {
            out.status = if recovery_workday && !input.recovery.presence_expected {
                DayStatus::RecoveryDay
            } else if minutes_between(start_at, input.as_of) > t.absence_grace_minutes {
                DayStatus::Absent
            } else {
                DayStatus::Pending
            };
            return Ok(out);
        }
    };

    out.late_minutes = (minutes_between(start_at, clock_in) - t.late_tolerance_minutes).max(0);

    let clock_out = match input.clock_out {
        Some(c) => c,
        None => return Ok(out),
    };

    out.early_leave_minutes =
        (minutes_between(clock_out, end_at) - t.early_leave_tolerance_minutes).max(0);

    let past_end = minutes_between(end_at, clock_out);
    let overtime_reached = past_end > t.overtime_threshold_minutes;
    if overtime_reached {
        out.overtime_minutes = past_end.min(t.max_overtime_minutes_per_day);
    }

    // the half-day minimum itself still counts as a short day
    out.status = if net <= t.min_half_day_minutes {
        DayStatus::Partial
    } else if out.late_minutes > 0 {
        DayStatus::Late
    } else if overtime_reached {
        DayStatus::Overtime
    } else {
        DayStatus::Present
    };

    Ok(out)
}
