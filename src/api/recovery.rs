use crate::api::sync::spawn_resync;
use crate::auth::auth::AuthUser;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::recovery::{RecoveryDeclaration, RecoveryKind, RecoveryPeriod};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateRecoveryPeriod {
    #[schema(example = "Ramadan 2026")]
    pub name: String,
    #[schema(example = "2026-02-18", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-19", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct DeclareRecovery {
    #[schema(example = "2026-03-07", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "workday")]
    pub kind: RecoveryKind,
    #[schema(example = "09:00:00", format = "time", value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(example = "13:00:00", format = "time", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    /// Empty targets every employee
    #[serde(default)]
    #[schema(example = json!([]))]
    pub employee_ids: Vec<u64>,
    #[serde(default)]
    #[schema(example = json!([]))]
    pub exempt_employee_ids: Vec<u64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/recovery/periods",
    request_body(content = CreateRecoveryPeriod, content_type = "application/json"),
    responses(
        (status = 200, description = "Recovery period created", body = RecoveryPeriod),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Recovery"
)]
pub async fn create_period(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<CreateRecoveryPeriod>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let period = engine
        .create_recovery_period(
            &Actor::from(&auth),
            payload.name,
            payload.start_date,
            payload.end_date,
        )
        .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/v1/recovery/periods/{period_id}/declarations",
    params(
        ("period_id" = u64, Path, description = "Recovery period ID")
    ),
    request_body(content = DeclareRecovery, content_type = "application/json"),
    responses(
        (status = 200, description = "Recovery declared; the date is resynchronized once reached", body = RecoveryDeclaration),
        (status = 400, description = "Date outside the period or hours inconsistent with the kind"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Recovery period not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Recovery"
)]
pub async fn declare(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    payload: web::Json<DeclareRecovery>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let targets = (!payload.employee_ids.is_empty()).then(|| payload.employee_ids.clone());

    let declaration = engine
        .declare_recovery(
            &Actor::from(&auth),
            path.into_inner(),
            payload.date,
            payload.kind,
            payload.start_time,
            payload.end_time,
            payload.employee_ids,
            payload.exempt_employee_ids,
        )
        .await?;

    spawn_resync(
        engine.clone(),
        vec![declaration.date],
        targets,
        format!("recovery declaration {}", declaration.id),
    );
    Ok(HttpResponse::Ok().json(declaration))
}
