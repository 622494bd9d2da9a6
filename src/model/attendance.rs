use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::day_status::DayStatus;

/// The authoritative row for one (employee, date). Overwritten in place;
/// history lives in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceDailyRecord {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub day_status: DayStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_in_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub scheduled_start: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub scheduled_end: Option<NaiveTime>,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub gross_worked_minutes: i64,
    pub net_worked_minutes: i64,
    pub overtime_minutes: i64,
    pub is_working_day: bool,
    pub is_recovery_day: bool,
    /// Append-only trail of recalculation reasons, one per line.
    pub notes: String,
    /// Optimistic lock; bumped on every write.
    pub version: u32,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceDailyRecord {
    /// A row with no facts yet, before its first classification.
    pub fn blank(employee_id: u64, work_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            employee_id,
            work_date,
            day_status: DayStatus::Pending,
            clock_in_at: None,
            clock_out_at: None,
            scheduled_start: None,
            scheduled_end: None,
            late_minutes: 0,
            early_leave_minutes: 0,
            gross_worked_minutes: 0,
            net_worked_minutes: 0,
            overtime_minutes: 0,
            is_working_day: false,
            is_recovery_day: false,
            notes: String::new(),
            version: 0,
            updated_at: now,
        }
    }

    /// Key used for this row in the audit log.
    pub fn audit_key(employee_id: u64, work_date: NaiveDate) -> String {
        format!("{}:{}", employee_id, work_date)
    }

    pub fn append_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_appended_line_by_line() {
        let mut r = AttendanceDailyRecord::blank(
            1,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            Utc::now(),
        );
        r.append_note("check-in");
        r.append_note("");
        r.append_note("holiday added");
        assert_eq!(r.notes, "check-in\nholiday added");
    }

    #[test]
    fn audit_key_is_employee_and_date() {
        let key = AttendanceDailyRecord::audit_key(42, NaiveDate::from_ymd_opt(2026, 2, 3).unwrap());
        assert_eq!(key, "42:2026-02-03");
    }
}
