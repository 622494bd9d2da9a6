use crate::api::sync::spawn_resync;
use crate::auth::auth::AuthUser;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::leave::{LeaveDeclaration, LeaveType};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-02-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "annual")]
    pub leave_type: LeaveType,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(content = CreateLeave, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave request created", body = LeaveDeclaration),
        (status = 400, description = "Bad request", body = Object, example = json!({
            "message": "Invalid input: start_date cannot be after end_date"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let leave = engine
        .create_leave(
            &Actor::from(&auth),
            payload.start_date,
            payload.end_date,
            payload.leave_type,
        )
        .await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "Leave request ID")
    ),
    responses(
        (status = 200, description = "Leave approved; covered days are resynchronized", body = LeaveDeclaration),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = engine
        .decide_leave(&Actor::from(&auth), path.into_inner(), true)
        .await?;

    spawn_resync(
        engine.clone(),
        leave.dates().collect(),
        Some(vec![leave.employee_id]),
        format!("leave {} approved", leave.id),
    );
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "Leave request ID")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveDeclaration),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = engine
        .decide_leave(&Actor::from(&auth), path.into_inner(), false)
        .await?;
    Ok(HttpResponse::Ok().json(leave))
}
