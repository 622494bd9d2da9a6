use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::engine::error::{EngineError, Result};

pub const LATE_TOLERANCE: &str = "late_tolerance_minutes";
pub const EARLY_LEAVE_TOLERANCE: &str = "early_leave_tolerance_minutes";
pub const MIN_FULL_DAY: &str = "min_full_day_minutes";
pub const MIN_HALF_DAY: &str = "min_half_day_minutes";
pub const OVERTIME_THRESHOLD: &str = "overtime_threshold_minutes";
pub const MAX_OVERTIME_PER_DAY: &str = "max_overtime_minutes_per_day";
pub const ABSENCE_GRACE: &str = "absence_grace_minutes";

/// Thresholds read from the settings store for each classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tolerances {
    pub late_tolerance_minutes: i64,
    pub early_leave_tolerance_minutes: i64,
    pub min_full_day_minutes: i64,
    pub min_half_day_minutes: i64,
    pub overtime_threshold_minutes: i64,
    pub max_overtime_minutes_per_day: i64,
    pub absence_grace_minutes: i64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            late_tolerance_minutes: 15,
            early_leave_tolerance_minutes: 15,
            min_full_day_minutes: 420,
            min_half_day_minutes: 210,
            overtime_threshold_minutes: 30,
            max_overtime_minutes_per_day: 240,
            absence_grace_minutes: 120,
        }
    }
}

impl Tolerances {
    /// Builds tolerances from raw key/value settings.
    ///
    /// Absent keys take the default; a present key that is not a
    /// non-negative integer, or half-day above full-day, is an error.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let read = |key: &str, fallback: i64| -> Result<i64> {
            match settings.get(key) {
                None => {
                    debug!(key, fallback, "Attendance setting missing, using default");
                    Ok(fallback)
                }
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "setting {} must be a non-negative integer, got {:?}",
                            key, raw
                        ))
                    }),
            }
        };

        let tolerances = Self {
            late_tolerance_minutes: read(LATE_TOLERANCE, defaults.late_tolerance_minutes)?,
            early_leave_tolerance_minutes: read(
                EARLY_LEAVE_TOLERANCE,
                defaults.early_leave_tolerance_minutes,
            )?,
            min_full_day_minutes: read(MIN_FULL_DAY, defaults.min_full_day_minutes)?,
            min_half_day_minutes: read(MIN_HALF_DAY, defaults.min_half_day_minutes)?,
            overtime_threshold_minutes: read(
                OVERTIME_THRESHOLD,
                defaults.overtime_threshold_minutes,
            )?,
            max_overtime_minutes_per_day: read(
                MAX_OVERTIME_PER_DAY,
                defaults.max_overtime_minutes_per_day,
            )?,
            absence_grace_minutes: read(ABSENCE_GRACE, defaults.absence_grace_minutes)?,
        };

        if tolerances.min_half_day_minutes > tolerances.min_full_day_minutes {
            return Err(EngineError::Configuration(format!(
                "{} ({}) exceeds {} ({})",
                MIN_HALF_DAY,
                tolerances.min_half_day_minutes,
                MIN_FULL_DAY,
                tolerances.min_full_day_minutes
            )));
        }

        Ok(tolerances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let t = Tolerances::from_settings(&settings(&[(LATE_TOLERANCE, " 5 ")])).unwrap();
        assert_eq!(t.late_tolerance_minutes, 5);
        assert_eq!(t.min_half_day_minutes, Tolerances::default().min_half_day_minutes);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for bad in ["ten", "-3", "1.5", ""] {
            let err = Tolerances::from_settings(&settings(&[(LATE_TOLERANCE, bad)])).unwrap_err();
            assert!(matches!(err, EngineError::Configuration(_)), "{bad}");
        }
    }

    #[test]
    fn half_day_above_full_day_is_rejected() {
        let err = Tolerances::from_settings(&settings(&[
            (MIN_HALF_DAY, "300"),
            (MIN_FULL_DAY, "240"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
