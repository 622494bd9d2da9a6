use crate::auth::auth::AuthUser;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::AuditLogEntry;
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct EditAttendance {
    #[schema(example = "2026-01-05T08:30:00", format = "date-time", value_type = Option<String>)]
    pub clock_in_at: Option<NaiveDateTime>,
    #[schema(example = "2026-01-05T17:30:00", format = "date-time", value_type = Option<String>)]
    pub clock_out_at: Option<NaiveDateTime>,
    #[schema(example = "Badge reader was down")]
    pub reason: String,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "day_status": "pending"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Invalid input: Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "No active work schedule"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
) -> actix_web::Result<impl Responder> {
    let record = engine.clock_in(&Actor::from(&auth), engine.now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked in successfully",
        "day_status": record.day_status,
        "late_minutes": record.late_minutes
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "day_status": "present"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "Invalid input: No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
) -> actix_web::Result<impl Responder> {
    let record = engine.clock_out(&Actor::from(&auth), engine.now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked out successfully",
        "day_status": record.day_status,
        "net_worked_minutes": record.net_worked_minutes
    })))
}

/// Daily attendance record for one employee
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{employee_id}/{date}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Work date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceDailyRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No record for this date", body = Object, example = json!({
            "message": "Attendance record not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_record(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, date) = path.into_inner();
    Actor::from(&auth).require_access_to(employee_id)?;

    match engine.record(employee_id, date).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Attendance record not found"
        }))),
    }
}

/// Replace clock events and reclassify (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{employee_id}/{date}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Work date, YYYY-MM-DD")
    ),
    request_body(
        content = EditAttendance,
        description = "New clock events and the reason for the edit",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record reclassified", body = AttendanceDailyRecord),
        (status = 400, description = "Reason missing or clock events out of order"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Record changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn edit_record(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<(u64, NaiveDate)>,
    payload: web::Json<EditAttendance>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, date) = path.into_inner();
    let record = engine
        .admin_edit(
            &Actor::from(&auth),
            employee_id,
            date,
            payload.clock_in_at,
            payload.clock_out_at,
            &payload.reason,
        )
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Audit trail of one attendance record, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{employee_id}/{date}/audit",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Work date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogEntry]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn record_audit(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, date) = path.into_inner();
    Actor::from(&auth).require_access_to(employee_id)?;

    let trail = engine.record_audit_trail(employee_id, date).await?;
    Ok(HttpResponse::Ok().json(trail))
}
