use crate::api::sync::spawn_resync;
use crate::auth::auth::AuthUser;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::schedule::{DayWindow, ScheduleInfo, WorkSchedule};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateSchedule {
    #[schema(example = "Standard week")]
    pub name: String,
    /// Set for a per-employee override; omit for the organization default
    #[schema(example = json!(null))]
    pub employee_id: Option<u64>,
    /// Exactly seven windows, Monday first
    pub days: Vec<DayWindow>,
    #[schema(example = 60)]
    pub break_minutes: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    request_body(
        content = CreateSchedule,
        description = "New schedule; it stays inactive until activated",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Schedule created", body = WorkSchedule),
        (status = 400, description = "Invalid day windows", body = Object, example = json!({
            "message": "Invalid input: A schedule needs exactly 7 day windows"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Schedule"
)]
pub async fn create_schedule(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<CreateSchedule>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let days: [DayWindow; 7] = match payload.days.try_into() {
        Ok(days) => days,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Invalid input: A schedule needs exactly 7 day windows"
            })));
        }
    };

    let schedule = engine
        .create_schedule(
            &Actor::from(&auth),
            payload.name,
            payload.employee_id,
            days,
            payload.break_minutes,
        )
        .await?;
    Ok(HttpResponse::Ok().json(schedule))
}

#[utoipa::path(
    put,
    path = "/api/v1/schedules/{schedule_id}/activate",
    params(
        ("schedule_id" = u64, Path, description = "Schedule ID")
    ),
    responses(
        (status = 200, description = "Schedule activated; today is resynchronized in the background", body = WorkSchedule),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Schedule not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Schedule"
)]
pub async fn activate_schedule(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let schedule = engine
        .activate_schedule(&Actor::from(&auth), path.into_inner())
        .await?;

    spawn_resync(
        engine.clone(),
        vec![engine.now().date()],
        schedule.employee_id.map(|id| vec![id]),
        format!("schedule {} activated", schedule.id),
    );
    Ok(HttpResponse::Ok().json(schedule))
}

#[utoipa::path(
    get,
    path = "/api/v1/schedules/resolve/{employee_id}/{date}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Effective schedule window", body = ScheduleInfo),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "No active work schedule")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Schedule"
)]
pub async fn resolve_schedule(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, date) = path.into_inner();
    Actor::from(&auth).require_access_to(employee_id)?;

    let info = engine.resolve(employee_id, date).await?;
    Ok(HttpResponse::Ok().json(info))
}
