use crate::api::sync::spawn_resync;
use crate::auth::auth::AuthUser;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::holiday::PublicHoliday;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-05-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Labour Day")]
    pub name: String,
    /// Repeats on the same month and day every year
    #[serde(default)]
    #[schema(example = true)]
    pub recurring: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/holidays",
    request_body(content = CreateHoliday, content_type = "application/json"),
    responses(
        (status = 200, description = "Holiday created; its date is resynchronized once reached", body = PublicHoliday),
        (status = 400, description = "Date in the past or name missing"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<CreateHoliday>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let holiday = engine
        .create_holiday(
            &Actor::from(&auth),
            payload.date,
            payload.name,
            payload.recurring,
        )
        .await?;

    spawn_resync(
        engine.clone(),
        vec![holiday.date],
        None,
        format!("holiday {} created", holiday.name),
    );
    Ok(HttpResponse::Ok().json(holiday))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateHoliday {
    #[schema(example = "2026-05-04", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Labour Day (observed)")]
    pub name: String,
    #[serde(default)]
    #[schema(example = false)]
    pub recurring: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/holidays/{holiday_id}",
    params(
        ("holiday_id" = u64, Path, description = "Holiday ID")
    ),
    request_body(content = UpdateHoliday, content_type = "application/json"),
    responses(
        (status = 200, description = "Holiday updated; old and new dates are resynchronized once reached", body = PublicHoliday),
        (status = 400, description = "Old or new date in the past, or name missing", body = Object, example = json!({
            "message": "Invalid input: holiday date 2026-01-05 is in the past"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Holiday not found"),
        (status = 409, description = "Holiday changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn update_holiday(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    payload: web::Json<UpdateHoliday>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let change = engine
        .update_holiday(
            &Actor::from(&auth),
            path.into_inner(),
            payload.date,
            payload.name,
            payload.recurring,
        )
        .await?;

    spawn_resync(
        engine.clone(),
        change.affected_dates,
        None,
        format!("holiday {} updated", change.holiday.name),
    );
    Ok(HttpResponse::Ok().json(change.holiday))
}
