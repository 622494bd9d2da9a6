use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Start/end pair for one weekday. Both `None` means the weekday is not worked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DayWindow {
    #[schema(example = "08:30:00", value_type = Option<String>, format = "time")]
    pub start: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = Option<String>, format = "time")]
    pub end: Option<NaiveTime>,
}

impl DayWindow {
    pub fn working(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn off() -> Self {
        Self::default()
    }

    pub fn minutes(&self) -> i64 {
        match (self.start, self.end) {
            (Some(s), Some(e)) => (e - s).num_minutes().max(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkSchedule {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Standard week")]
    pub name: String,
    /// Set for an employee-specific override, `None` for the organization-wide schedule.
    #[schema(example = json!(null), nullable = true)]
    pub employee_id: Option<u64>,
    /// Monday first.
    #[schema(value_type = Vec<DayWindow>)]
    pub days: [DayWindow; 7],
    #[schema(example = 60)]
    pub break_minutes: i64,
    #[schema(example = 2400)]
    pub weekly_minutes: i64,
    pub active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl WorkSchedule {
    pub fn window(&self, weekday: Weekday) -> DayWindow {
        self.days[weekday.num_days_from_monday() as usize]
    }

    /// Weekly total of scheduled minutes, breaks deducted on every working day.
    pub fn compute_weekly_minutes(days: &[DayWindow; 7], break_minutes: i64) -> i64 {
        days.iter()
            .filter(|d| d.start.is_some() && d.end.is_some())
            .map(|d| (d.minutes() - break_minutes).max(0))
            .sum()
    }
}

/// What the resolver hands to the classifier for one employee-date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScheduleInfo {
    #[schema(value_type = Option<String>, format = "time")]
    pub scheduled_start: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub scheduled_end: Option<NaiveTime>,
    pub scheduled_break_minutes: i64,
    pub is_working_day: bool,
}

impl ScheduleInfo {
    pub fn non_working() -> Self {
        Self {
            scheduled_start: None,
            scheduled_end: None,
            scheduled_break_minutes: 0,
            is_working_day: false,
        }
    }
}
