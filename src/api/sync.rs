use crate::auth::auth::AuthUser;
use crate::engine::synchronizer::SyncReport;
use crate::engine::{Actor, AttendanceEngine};
use actix_web::{HttpResponse, Responder, web};
use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct SyncRequest {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Omit to resync every employee who clocks
    #[schema(example = json!([1000, 1001]))]
    pub employee_ids: Option<Vec<u64>>,
    #[schema(example = "Badge export re-imported")]
    pub reason: String,
}

/// Runs a resync off the request path. Only dates up to today are touched;
/// later dates are classified as they arrive.
pub(crate) fn spawn_resync(
    engine: web::Data<AttendanceEngine>,
    dates: Vec<NaiveDate>,
    employee_ids: Option<Vec<u64>>,
    reason: String,
) {
    let today = engine.now().date();
    let dates: Vec<NaiveDate> = dates.into_iter().filter(|d| *d <= today).collect();
    if dates.is_empty() {
        return;
    }

    actix_web::rt::spawn(async move {
        if let Err(e) = run_resync(&engine, dates, employee_ids, &reason).await {
            tracing::error!(error = ?e, %reason, "Background resync failed");
        }
    });
}

async fn run_resync(
    engine: &AttendanceEngine,
    dates: Vec<NaiveDate>,
    employee_ids: Option<Vec<u64>>,
    reason: &str,
) -> anyhow::Result<()> {
    let reports = engine
        .resync_dates(dates, employee_ids, reason)
        .await
        .context("resync could not start")?;
    for report in reports.iter().filter(|r| r.failed > 0) {
        tracing::warn!(
            run_id = %report.run_id,
            date = %report.date,
            failed = report.failed,
            "Background resync finished with failures"
        );
    }
    Ok(())
}

/// Synchronous resync of one date (Admin)
#[utoipa::path(
    post,
    path = "/api/v1/sync",
    request_body(
        content = SyncRequest,
        description = "Date and optional employee subset to reclassify",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Resync report", body = SyncReport),
        (status = 400, description = "Reason missing", body = Object, example = json!({
            "message": "Invalid input: A reason is required"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn run_sync(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<SyncRequest>,
) -> actix_web::Result<impl Responder> {
    let actor = Actor::from(&auth);
    actor.require_admin()?;

    let payload = payload.into_inner();
    if payload.reason.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Invalid input: A reason is required"
        })));
    }

    let report = engine
        .resync(payload.date, payload.employee_ids, payload.reason.trim())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}
