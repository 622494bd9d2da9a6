use crate::auth::auth::AuthUser;
use crate::engine::workflow::CorrectionInput;
use crate::engine::{Actor, AttendanceEngine};
use crate::model::correction::CorrectionRequest;
use crate::store::CorrectionFilter;
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateCorrection {
    /// HR/Admin only: file on behalf of this employee
    #[schema(example = json!(null))]
    pub employee_id: Option<u64>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = json!(null), format = "time", value_type = Option<String>)]
    pub requested_clock_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", format = "time", value_type = Option<String>)]
    pub requested_clock_out: Option<NaiveTime>,
    #[schema(example = "Forgot to clock out")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DecideCorrection {
    /// Approval level acting, starting at 1
    #[schema(example = 1)]
    pub level: u8,
    #[schema(example = "Confirmed with the team lead")]
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CancelCorrection {
    #[schema(example = "Approved by mistake")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CorrectionQuery {
    /// Filter by employee ID (ignored for employees, who only see their own)
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    /// Filter by status, e.g. `pending` or `n2_approved`
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    /// Pagination per page number
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct CorrectionListResponse {
    pub data: Vec<CorrectionRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
File a correction request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/corrections",
    request_body(
        content = CreateCorrection,
        description = "Requested clock times; omitted times keep the stored value",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Correction request filed", body = CorrectionRequest),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A request is already open for this date")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn create_correction(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<CreateCorrection>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let request = engine
        .file_correction(
            &Actor::from(&auth),
            CorrectionInput {
                employee_id: payload.employee_id,
                work_date: payload.work_date,
                requested_clock_in: payload.requested_clock_in,
                requested_clock_out: payload.requested_clock_out,
                reason: payload.reason,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/v1/corrections",
    params(CorrectionQuery),
    responses(
        (status = 200, description = "Paginated correction requests", body = CorrectionListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn list_corrections(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<CorrectionQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);

    let (data, total) = engine
        .list_corrections(
            &Actor::from(&auth),
            CorrectionFilter {
                employee_id: query.employee_id,
                status: query.status,
                page,
                per_page,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(CorrectionListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/corrections/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Correction request ID")
    ),
    responses(
        (status = 200, description = "Correction request", body = CorrectionRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Correction request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn get_correction(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = engine
        .correction(&Actor::from(&auth), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Approve one level
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/corrections/{request_id}/approve",
    params(
        ("request_id" = u64, Path, description = "Correction request ID")
    ),
    request_body(content = DecideCorrection, content_type = "application/json"),
    responses(
        (status = 200, description = "Level approved; the last level applies the correction", body = CorrectionRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an approver for this level"),
        (status = 404, description = "Correction request not found"),
        (status = 409, description = "Out of sequence, already decided, or changed concurrently", body = Object, example = json!({
            "message": "Approval out of sequence: level 1 must act before level 2"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn approve_correction(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    payload: web::Json<DecideCorrection>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let request = engine
        .approve_correction(
            &Actor::from(&auth),
            path.into_inner(),
            payload.level,
            payload.comment,
        )
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/corrections/{request_id}/reject",
    params(
        ("request_id" = u64, Path, description = "Correction request ID")
    ),
    request_body(content = DecideCorrection, content_type = "application/json"),
    responses(
        (status = 200, description = "Correction request rejected", body = CorrectionRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an approver for this level"),
        (status = 404, description = "Correction request not found"),
        (status = 409, description = "Out of sequence, already decided, or changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn reject_correction(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    payload: web::Json<DecideCorrection>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let request = engine
        .reject_correction(
            &Actor::from(&auth),
            path.into_inner(),
            payload.level,
            payload.comment,
        )
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Administrative cancellation
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/corrections/{request_id}/cancel",
    params(
        ("request_id" = u64, Path, description = "Correction request ID")
    ),
    request_body(content = CancelCorrection, content_type = "application/json"),
    responses(
        (status = 200, description = "Cancelled; an applied correction is reverted", body = CorrectionRequest),
        (status = 400, description = "Reason missing"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Correction request not found"),
        (status = 409, description = "Already cancelled or changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Correction"
)]
pub async fn cancel_correction(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    payload: web::Json<CancelCorrection>,
) -> actix_web::Result<impl Responder> {
    let request = engine
        .cancel_correction(&Actor::from(&auth), path.into_inner(), &payload.reason)
        .await?;
    Ok(HttpResponse::Ok().json(request))
}
