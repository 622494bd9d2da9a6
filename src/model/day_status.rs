use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Authoritative classification of one employee's calendar day.
///
/// This vocabulary is closed. Adding a variant means touching the classifier,
/// the storage decoder and the API docs in the same change; rows holding a
/// name that is not listed here fail to decode instead of being passed through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayStatus {
    Absent,
    Present,
    Late,
    Partial,
    Overtime,
    Leave,
    Holiday,
    Weekend,
    /// Recovery workday on which this employee is not expected to attend.
    RecoveryDay,
    /// Day off granted against hours recovered on another date.
    RecoveryOff,
    /// Day not closed yet (clocked in only, or still inside the absence grace).
    Pending,
}
