use crate::api::attendance::EditAttendance;
use crate::api::correction::{
    CancelCorrection, CorrectionListResponse, CorrectionQuery, CreateCorrection, DecideCorrection,
};
use crate::api::holiday::{CreateHoliday, UpdateHoliday};
use crate::api::leave::CreateLeave;
use crate::api::recovery::{CreateRecoveryPeriod, DeclareRecovery};
use crate::api::schedule::CreateSchedule;
use crate::api::sync::SyncRequest;
use crate::engine::synchronizer::{SyncFailure, SyncReport};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::{AuditAction, AuditLogEntry};
use crate::model::correction::{ApprovalDecision, ApprovalSlot, CorrectionRequest};
use crate::model::day_status::DayStatus;
use crate::model::holiday::PublicHoliday;
use crate::model::leave::{LeaveDeclaration, LeaveStatus, LeaveType};
use crate::model::recovery::{RecoveryDeclaration, RecoveryKind, RecoveryPeriod};
use crate::model::schedule::{DayWindow, ScheduleInfo, WorkSchedule};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Engine API",
        version = "1.0.0",
        description = r#"
## Attendance day-status engine

Classifies every employee-day from clock events, work schedules, public holidays,
approved leave and recovery declarations, and routes attendance corrections
through a multi-level approval chain.

### Key Features
- **Attendance**: check-in, check-out, record lookup, HR edits with audit trail
- **Corrections**: file, approve level by level, reject, administrative cancel
- **Calendar**: schedules, holidays, leave, recovery periods
- **Sync**: reclassify a date after upstream facts change

### Security
Every endpoint requires a **JWT Bearer** access token issued by the HR identity service.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::get_record,
        crate::api::attendance::edit_record,
        crate::api::attendance::record_audit,

        crate::api::correction::create_correction,
        crate::api::correction::list_corrections,
        crate::api::correction::get_correction,
        crate::api::correction::approve_correction,
        crate::api::correction::reject_correction,
        crate::api::correction::cancel_correction,

        crate::api::schedule::create_schedule,
        crate::api::schedule::activate_schedule,
        crate::api::schedule::resolve_schedule,

        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,

        crate::api::leave::create_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,

        crate::api::recovery::create_period,
        crate::api::recovery::declare,

        crate::api::sync::run_sync
    ),
    components(
        schemas(
            AttendanceDailyRecord,
            DayStatus,
            EditAttendance,
            AuditLogEntry,
            AuditAction,
            CorrectionRequest,
            ApprovalSlot,
            ApprovalDecision,
            CreateCorrection,
            DecideCorrection,
            CancelCorrection,
            CorrectionQuery,
            CorrectionListResponse,
            WorkSchedule,
            DayWindow,
            ScheduleInfo,
            CreateSchedule,
            PublicHoliday,
            CreateHoliday,
            UpdateHoliday,
            LeaveDeclaration,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            RecoveryPeriod,
            RecoveryDeclaration,
            RecoveryKind,
            CreateRecoveryPeriod,
            DeclareRecovery,
            SyncRequest,
            SyncReport,
            SyncFailure
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Clock events and daily records"),
        (name = "Correction", description = "Correction approval workflow"),
        (name = "Schedule", description = "Work schedules"),
        (name = "Holiday", description = "Public holidays"),
        (name = "Leave", description = "Leave declarations"),
        (name = "Recovery", description = "Recovery periods and declarations"),
        (name = "Sync", description = "Reclassification runs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
