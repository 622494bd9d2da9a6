use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicHoliday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "2026-05-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Labour Day")]
    pub name: String,
    /// Falls on the same month/day every year from `date` onwards.
    pub recurring: bool,
}

impl PublicHoliday {
    pub fn falls_on(&self, day: NaiveDate) -> bool {
        if self.recurring {
            day >= self.date && day.month() == self.date.month() && day.day() == self.date.day()
        } else {
            day == self.date
        }
    }
}
