//! Attendance day-status engine.
//!
//! [`AttendanceEngine`] ties the pure classifier to the store: it resolves
//! schedules, gathers calendar facts, runs the correction workflow and the
//! resynchronization batch. HTTP handlers only translate requests into calls
//! on it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::auth::auth::AuthUser;
use crate::engine::classifier::{Classification, ClassifyInput, classify};
use crate::engine::error::{EngineError, Result};
use crate::engine::locks::RecordLocks;
use crate::engine::tolerances::Tolerances;
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::recovery::{EmployeeRecovery, RecoveryDeclaration, RecoveryInfo, RecoveryKind};
use crate::model::role::Role;
use crate::model::schedule::ScheduleInfo;
use crate::store::AttendanceStore;

pub mod attendance;
pub mod audit;
pub mod calendar;
pub mod classifier;
pub mod error;
pub mod locks;
pub mod schedule_resolver;
pub mod synchronizer;
pub mod tolerances;
pub mod workflow;

pub const ATTENDANCE_TABLE: &str = "attendance_daily_records";
pub const CORRECTION_TABLE: &str = "correction_requests";
pub const SCHEDULE_TABLE: &str = "work_schedules";
pub const HOLIDAY_TABLE: &str = "public_holidays";

/// Who is acting, as established by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub employee_id: Option<u64>,
    pub role: Role,
}

impl Actor {
    /// Background jobs act as user 0 with the system tier.
    pub fn system() -> Self {
        Self {
            user_id: 0,
            employee_id: None,
            role: Role::System,
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<()> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied("HR/Admin only".into()))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied("Admin only".into()))
        }
    }

    /// Employees may only look at their own data; HR/Admin see everyone's.
    pub fn require_access_to(&self, employee_id: u64) -> Result<()> {
        if self.role.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied("Not your record".into()))
        }
    }

    pub fn own_employee_id(&self) -> Result<u64> {
        self.employee_id
            .ok_or_else(|| EngineError::PermissionDenied("No employee profile".into()))
    }
}

impl From<&AuthUser> for Actor {
    fn from(auth: &AuthUser) -> Self {
        Self {
            user_id: auth.user_id,
            employee_id: auth.employee_id,
            role: auth.role,
        }
    }
}

/// Permission tier required at each approval level, level 1 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalChain {
    levels: Vec<Role>,
}

impl ApprovalChain {
    pub fn new(levels: Vec<Role>) -> std::result::Result<Self, String> {
        if levels.is_empty() {
            return Err("approval chain needs at least one level".into());
        }
        if levels.len() > u8::MAX as usize {
            return Err(format!("approval chain too long ({} levels)", levels.len()));
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> u8 {
        self.levels.len() as u8
    }

    /// Admins may act at any level; everyone else only at levels of their tier.
    pub fn allows(&self, level: u8, role: Role) -> bool {
        if role == Role::Admin {
            return true;
        }
        level
            .checked_sub(1)
            .and_then(|i| self.levels.get(i as usize))
            .map_or(false, |required| *required == role)
    }
}

impl FromStr for ApprovalChain {
    type Err = String;

    /// Comma-separated tiers, e.g. `hr,hr,admin`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let levels = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Role::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(levels)
    }
}

impl Default for ApprovalChain {
    fn default() -> Self {
        Self {
            levels: vec![Role::Hr, Role::Hr, Role::Admin],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Employee-days classified in parallel by one resync run.
    pub concurrency: usize,
    pub item_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            item_timeout: Duration::from_secs(10),
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Everything the classifier needs about one employee-date except clock events.
#[derive(Debug, Clone)]
pub(crate) struct DayFacts {
    pub schedule: ScheduleInfo,
    pub is_holiday: bool,
    pub on_approved_leave: bool,
    pub recovery: Option<(RecoveryDeclaration, Option<EmployeeRecovery>)>,
    pub tolerances: Tolerances,
}

impl DayFacts {
    pub fn recovery_info(&self) -> RecoveryInfo {
        match &self.recovery {
            Some((decl, ledger)) => RecoveryInfo::from_declaration(decl, ledger.as_ref()),
            None => RecoveryInfo::none(),
        }
    }
}

pub struct AttendanceEngine {
    store: Arc<dyn AttendanceStore>,
    locks: RecordLocks,
    chain: ApprovalChain,
    sync: SyncSettings,
    clock: fn() -> NaiveDateTime,
}

impl AttendanceEngine {
    pub fn new(store: Arc<dyn AttendanceStore>, chain: ApprovalChain, sync: SyncSettings) -> Self {
        Self {
            store,
            locks: RecordLocks::new(),
            chain,
            sync,
            clock: local_now,
        }
    }

    /// Replaces the wall clock used to tell absent from pending.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Settings are read on every call, so a change made mid-batch applies
    /// to the remaining employee-days of that batch.
    pub(crate) async fn tolerances(&self) -> Result<Tolerances> {
        let settings = self.store.settings().await?;
        Tolerances::from_settings(&settings)
    }

    pub(crate) async fn day_facts(&self, employee_id: u64, date: NaiveDate) -> Result<DayFacts> {
        let tolerances = self.tolerances().await?;
        let schedule = self.resolve(employee_id, date).await?;
        let is_holiday = !self.store.holidays_on(date).await?.is_empty();
        let on_approved_leave = self
            .store
            .approved_leave_on(employee_id, date)
            .await?
            .is_some();
        let recovery = self.store.recovery_on(employee_id, date).await?;

        debug!(
            employee_id,
            %date,
            is_holiday,
            on_approved_leave,
            has_recovery = recovery.is_some(),
            "Loaded day facts"
        );

        Ok(DayFacts {
            schedule,
            is_holiday,
            on_approved_leave,
            recovery,
            tolerances,
        })
    }

    pub(crate) fn classify_with(
        &self,
        facts: &DayFacts,
        record: &AttendanceDailyRecord,
    ) -> Result<Classification> {
        classify(&ClassifyInput {
            employee_id: record.employee_id,
            work_date: record.work_date,
            as_of: self.now(),
            clock_in: record.clock_in_at,
            clock_out: record.clock_out_at,
            schedule: facts.schedule,
            is_holiday: facts.is_holiday,
            on_approved_leave: facts.on_approved_leave,
            recovery: facts.recovery_info(),
            tolerances: facts.tolerances,
        })
    }

    /// Ledger row for a classified recovery workday, or `None` when it is
    /// not a recovery workday or the stored row is already current.
    pub(crate) fn recovery_ledger(
        facts: &DayFacts,
        record: &AttendanceDailyRecord,
        classification: &Classification,
    ) -> Option<EmployeeRecovery> {
        let (decl, existing) = match &facts.recovery {
            Some((decl, existing)) if decl.kind == RecoveryKind::Workday => (decl, existing),
            _ => return None,
        };

        let presence_expected = existing.as_ref().map_or(true, |l| l.presence_expected);
        let required = match (classification.scheduled_start, classification.scheduled_end) {
            (Some(s), Some(e)) => {
                let brk = if facts.schedule.is_working_day {
                    facts.schedule.scheduled_break_minutes
                } else {
                    0
                };
                ((e - s).num_minutes() - brk).max(0)
            }
            _ => 0,
        };
        let ledger = EmployeeRecovery {
            declaration_id: decl.id,
            employee_id: record.employee_id,
            presence_expected,
            presence_observed: record.clock_in_at.is_some(),
            deduction_minutes: if presence_expected {
                (required - classification.net_worked_minutes).max(0)
            } else {
                0
            },
        };

        (existing.as_ref() != Some(&ledger)).then_some(ledger)
    }

    pub(crate) fn bumped(record: &mut AttendanceDailyRecord) {
        record.version += 1;
        record.updated_at = Utc::now();
    }
}
