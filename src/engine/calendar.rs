//! Upstream calendar facts: holidays, leave and recovery declarations.
//!
//! These writes never reclassify anything themselves. Callers hand the
//! returned dates to the synchronizer in the background.

use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::engine::audit::AuditLog;
use crate::engine::error::{EngineError, Result};
use crate::engine::{Actor, AttendanceEngine, HOLIDAY_TABLE};
use crate::model::audit::AuditAction;
use crate::model::holiday::PublicHoliday;
use crate::model::leave::{LeaveDeclaration, LeaveStatus, LeaveType};
use crate::model::recovery::{RecoveryDeclaration, RecoveryKind, RecoveryPeriod};
use crate::store::{
    NewHoliday, NewLeave, NewRecoveryDeclaration, NewRecoveryPeriod, WriteOutcome,
};

/// An edited holiday and the dates whose classification it may have moved.
#[derive(Debug, Clone)]
pub struct HolidayChange {
    pub holiday: PublicHoliday,
    /// Previous and new date, deduplicated.
    pub affected_dates: Vec<NaiveDate>,
}

impl AttendanceEngine {
    /// Past dates are settled and cannot receive a new holiday.
    pub async fn create_holiday(
        &self,
        actor: &Actor,
        date: NaiveDate,
        name: String,
        recurring: bool,
    ) -> Result<PublicHoliday> {
        actor.require_hr_or_admin()?;
        if date < self.now().date() {
            return Err(EngineError::InvalidInput(format!(
                "holiday date {} is in the past",
                date
            )));
        }
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("holiday name is required".into()));
        }
        let holiday = self
            .store
            .insert_holiday(NewHoliday {
                date,
                name: name.trim().to_string(),
                recurring,
            })
            .await?;
        info!(holiday_id = holiday.id, %date, recurring, "Public holiday created");
        Ok(holiday)
    }

    /// Moves or renames a holiday. Both the old and the new date must still
    /// be ahead of today.
    pub async fn update_holiday(
        &self,
        actor: &Actor,
        holiday_id: u64,
        date: NaiveDate,
        name: String,
        recurring: bool,
    ) -> Result<HolidayChange> {
        actor.require_hr_or_admin()?;
        let before = self
            .store
            .holiday(holiday_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Holiday {}", holiday_id)))?;
        let today = self.now().date();
        if before.date < today {
            return Err(EngineError::InvalidInput(format!(
                "holiday {} on {} is in the past and can no longer change",
                holiday_id, before.date
            )));
        }
        if date < today {
            return Err(EngineError::InvalidInput(format!(
                "holiday date {} is in the past",
                date
            )));
        }
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("holiday name is required".into()));
        }

        let after = PublicHoliday {
            id: holiday_id,
            date,
            name: name.trim().to_string(),
            recurring,
        };
        let audit = AuditLog::entry(
            HOLIDAY_TABLE,
            holiday_id.to_string(),
            AuditAction::HolidayUpdated,
            Some(&before),
            Some(&after),
            actor,
            None,
        )?;
        match self.store.update_holiday(&before, after.clone(), audit).await? {
            WriteOutcome::Written => {}
            WriteOutcome::Conflict => {
                return Err(EngineError::Conflict(format!("holiday {}", holiday_id)));
            }
        }

        let mut affected_dates = vec![before.date, after.date];
        affected_dates.dedup();
        info!(holiday_id, from = %before.date, to = %after.date, recurring, "Public holiday updated");
        Ok(HolidayChange {
            holiday: after,
            affected_dates,
        })
    }

    pub async fn create_leave(
        &self,
        actor: &Actor,
        start_date: NaiveDate,
        end_date: NaiveDate,
        leave_type: LeaveType,
    ) -> Result<LeaveDeclaration> {
        let employee_id = actor.own_employee_id()?;
        if start_date > end_date {
            return Err(EngineError::InvalidInput(
                "start_date cannot be after end_date".into(),
            ));
        }
        Ok(self
            .store
            .insert_leave(NewLeave {
                employee_id,
                start_date,
                end_date,
                leave_type,
            })
            .await?)
    }

    /// Decides a pending leave. Approving returns the leave so its dates can
    /// be resynchronized; rejecting changes no classification.
    pub async fn decide_leave(
        &self,
        actor: &Actor,
        leave_id: u64,
        approve: bool,
    ) -> Result<LeaveDeclaration> {
        actor.require_hr_or_admin()?;
        let to = if approve {
            LeaveStatus::Approved
        } else {
            LeaveStatus::Rejected
        };
        if !self
            .store
            .set_leave_status(leave_id, LeaveStatus::Pending, to)
            .await?
        {
            return Err(EngineError::InvalidInput(
                "Leave request not found or already processed".into(),
            ));
        }
        let leave = self
            .store
            .leave(leave_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Leave {}", leave_id)))?;
        info!(leave_id, status = ?leave.status, "Leave decided");
        Ok(leave)
    }

    pub async fn create_recovery_period(
        &self,
        actor: &Actor,
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RecoveryPeriod> {
        actor.require_hr_or_admin()?;
        if start_date > end_date {
            return Err(EngineError::InvalidInput(
                "start_date cannot be after end_date".into(),
            ));
        }
        Ok(self
            .store
            .insert_recovery_period(NewRecoveryPeriod {
                name,
                start_date,
                end_date,
            })
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn declare_recovery(
        &self,
        actor: &Actor,
        period_id: u64,
        date: NaiveDate,
        kind: RecoveryKind,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        employee_ids: Vec<u64>,
        exempt_employee_ids: Vec<u64>,
    ) -> Result<RecoveryDeclaration> {
        actor.require_hr_or_admin()?;
        let period = self
            .store
            .recovery_period(period_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Recovery period {}", period_id)))?;
        if date < period.start_date || date > period.end_date {
            return Err(EngineError::InvalidInput(format!(
                "{} is outside recovery period {}",
                date, period.name
            )));
        }
        match (kind, start_time, end_time) {
            (RecoveryKind::DayOff, None, None) => {}
            (RecoveryKind::DayOff, _, _) => {
                return Err(EngineError::InvalidInput(
                    "a recovery day off carries no working hours".into(),
                ));
            }
            (RecoveryKind::Workday, Some(s), Some(e)) if s >= e => {
                return Err(EngineError::InvalidInput(
                    "recovery hours end before they start".into(),
                ));
            }
            (RecoveryKind::Workday, Some(_), None) | (RecoveryKind::Workday, None, Some(_)) => {
                return Err(EngineError::InvalidInput(
                    "recovery hours need both start and end".into(),
                ));
            }
            (RecoveryKind::Workday, _, _) => {}
        }
        if !employee_ids.is_empty()
            && exempt_employee_ids.iter().any(|e| !employee_ids.contains(e))
        {
            return Err(EngineError::InvalidInput(
                "exempt employees must be among the targeted employees".into(),
            ));
        }

        let declaration = self
            .store
            .insert_recovery_declaration(NewRecoveryDeclaration {
                period_id,
                date,
                kind,
                start_time,
                end_time,
                employee_ids,
                exempt_employee_ids,
            })
            .await?;
        info!(
            declaration_id = declaration.id,
            %date,
            ?kind,
            "Recovery declared"
        );
        Ok(declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{employee, engine, hr, monday, t};
    use crate::store::AttendanceStore;

    #[tokio::test]
    async fn past_holidays_are_rejected() {
        let (engine, _) = engine().await;
        // fixed clock is 2026-02-01
        assert!(matches!(
            engine
                .create_holiday(&hr(1), monday(), "Late".into(), false)
                .await,
            Err(EngineError::InvalidInput(_))
        ));
        let future = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let h = engine
            .create_holiday(&hr(1), future, "Labour Day".into(), true)
            .await
            .unwrap();
        assert!(h.recurring);
    }

    #[tokio::test]
    async fn holidays_move_only_between_future_dates() {
        let (engine, store) = engine().await;
        let may_day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let moved_to = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let h = engine
            .create_holiday(&hr(1), may_day, "Labour Day".into(), false)
            .await
            .unwrap();

        assert!(matches!(
            engine
                .update_holiday(&employee(1000), h.id, moved_to, "Labour Day".into(), false)
                .await,
            Err(EngineError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine
                .update_holiday(&hr(1), h.id, monday(), "Labour Day".into(), false)
                .await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine
                .update_holiday(&hr(1), 999, moved_to, "Labour Day".into(), false)
                .await,
            Err(EngineError::NotFound(_))
        ));

        let change = engine
            .update_holiday(&hr(1), h.id, moved_to, " Labour Day (observed) ".into(), false)
            .await
            .unwrap();
        assert_eq!(change.affected_dates, vec![may_day, moved_to]);
        assert_eq!(change.holiday.name, "Labour Day (observed)");
        assert!(store.holidays_on(may_day).await.unwrap().is_empty());
        assert_eq!(store.holidays_on(moved_to).await.unwrap(), vec![change.holiday.clone()]);

        let trail = store
            .audit_trail(HOLIDAY_TABLE, &h.id.to_string())
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::HolidayUpdated);
        assert_eq!(trail[0].before.as_ref().unwrap()["date"], "2026-05-01");

        let renamed = engine
            .update_holiday(&hr(1), h.id, moved_to, "Workers' Day".into(), true)
            .await
            .unwrap();
        assert_eq!(renamed.affected_dates, vec![moved_to]);
    }

    #[tokio::test]
    async fn past_holidays_cannot_be_moved() {
        let (engine, store) = engine().await;
        let settled = store
            .insert_holiday(NewHoliday {
                date: monday(),
                name: "Snow day".into(),
                recurring: false,
            })
            .await
            .unwrap();
        let future = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert!(matches!(
            engine
                .update_holiday(&hr(1), settled.id, future, "Snow day".into(), false)
                .await,
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(store.holiday(settled.id).await.unwrap(), Some(settled));
    }

    #[tokio::test]
    async fn leave_is_decided_once() {
        let (engine, _) = engine().await;
        let leave = engine
            .create_leave(&employee(1000), monday(), monday(), LeaveType::Annual)
            .await
            .unwrap();
        assert_eq!(leave.status, LeaveStatus::Pending);

        assert!(matches!(
            engine.decide_leave(&employee(1000), leave.id, true).await,
            Err(EngineError::PermissionDenied(_))
        ));
        let approved = engine.decide_leave(&hr(1), leave.id, true).await.unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        assert!(engine.decide_leave(&hr(1), leave.id, false).await.is_err());
    }

    #[tokio::test]
    async fn recovery_declarations_are_validated() {
        let (engine, _) = engine().await;
        let period = engine
            .create_recovery_period(&hr(1), "Bridge".into(), monday(), monday() + chrono::Duration::days(30))
            .await
            .unwrap();

        let outside = monday() + chrono::Duration::days(60);
        assert!(
            engine
                .declare_recovery(&hr(1), period.id, outside, RecoveryKind::DayOff, None, None, vec![], vec![])
                .await
                .is_err()
        );
        assert!(
            engine
                .declare_recovery(
                    &hr(1),
                    period.id,
                    monday(),
                    RecoveryKind::DayOff,
                    Some(t(9, 0)),
                    Some(t(12, 0)),
                    vec![],
                    vec![]
                )
                .await
                .is_err()
        );
        assert!(
            engine
                .declare_recovery(
                    &hr(1),
                    period.id,
                    monday(),
                    RecoveryKind::Workday,
                    None,
                    None,
                    vec![1000],
                    vec![1001]
                )
                .await
                .is_err()
        );
        let ok = engine
            .declare_recovery(
                &hr(1),
                period.id,
                monday(),
                RecoveryKind::Workday,
                Some(t(9, 0)),
                Some(t(13, 0)),
                vec![],
                vec![1002],
            )
            .await
            .unwrap();
        assert!(ok.targets(1000));
    }
}
