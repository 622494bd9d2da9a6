use crate::{
    api::{attendance, correction, holiday, leave, recovery, schedule, sync},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("non-zero period and burst size");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let sync_limiter = Arc::new(build_limiter(config.rate_sync_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/{employee_id}/{date}
                    .service(
                        web::resource("/{employee_id}/{date}")
                            .route(web::get().to(attendance::get_record))
                            .route(web::put().to(attendance::edit_record)),
                    )
                    .service(
                        web::resource("/{employee_id}/{date}/audit")
                            .route(web::get().to(attendance::record_audit)),
                    ),
            )
            .service(
                web::scope("/corrections")
                    .service(
                        web::resource("")
                            .route(web::get().to(correction::list_corrections))
                            .route(web::post().to(correction::create_correction)),
                    )
                    .service(
                        web::resource("/{id}").route(web::get().to(correction::get_correction)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(correction::approve_correction)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(correction::reject_correction)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(correction::cancel_correction)),
                    ),
            )
            .service(
                web::scope("/schedules")
                    .service(web::resource("").route(web::post().to(schedule::create_schedule)))
                    .service(
                        web::resource("/resolve/{employee_id}/{date}")
                            .route(web::get().to(schedule::resolve_schedule)),
                    )
                    .service(
                        web::resource("/{id}/activate")
                            .route(web::put().to(schedule::activate_schedule)),
                    ),
            )
            .service(
                web::scope("/holidays")
                    .service(web::resource("").route(web::post().to(holiday::create_holiday)))
                    .service(
                        web::resource("/{id}").route(web::put().to(holiday::update_holiday)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(web::resource("").route(web::post().to(leave::create_leave)))
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(leave::reject_leave)),
                    ),
            )
            .service(
                web::scope("/recovery")
                    .service(
                        web::resource("/periods").route(web::post().to(recovery::create_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/declarations")
                            .route(web::post().to(recovery::declare)),
                    ),
            )
            .service(
                web::resource("/sync")
                    .wrap(sync_limiter)
                    .route(web::post().to(sync::run_sync)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine, fixed_now};
    use crate::engine::{ApprovalChain, AttendanceEngine};
    use crate::models::{Claims, TokenType};
    use actix_web::{App, http::StatusCode, test, web::Data};
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "route-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            db_max_connections: 1,
            rate_protected_per_min: 1000,
            rate_sync_per_min: 1000,
            api_prefix: "/api/v1".into(),
            approval_chain: ApprovalChain::default(),
            sync_concurrency: 2,
            sync_item_timeout_ms: 1000,
        }
    }

    fn token(role: u8, employee_id: Option<u64>) -> String {
        let claims = Claims {
            user_id: 7,
            sub: "route.user".into(),
            role,
            exp: (chrono::Utc::now().timestamp() + 600) as usize,
            jti: "route-test".into(),
            token_type: TokenType::Access,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"route-secret"),
        )
        .unwrap()
    }

    async fn app_engine() -> Data<AttendanceEngine> {
        let (engine, _) = engine().await;
        Data::new(engine)
    }

    #[actix_web::test]
    async fn requests_without_a_token_are_unauthorized() {
        let engine = app_engine().await;
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .app_data(engine)
                .configure(|cfg| configure(cfg, config())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/attendance/check-in")
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn employees_cannot_read_someone_elses_record() {
        let engine = app_engine().await;
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .app_data(engine)
                .configure(|cfg| configure(cfg, config())),
        )
        .await;

        let date = fixed_now().date();
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/attendance/2/{}", date))
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {}", token(3, Some(1)))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn sync_requires_a_reason() {
        let engine = app_engine().await;
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .app_data(engine)
                .configure(|cfg| configure(cfg, config())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/sync")
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {}", token(1, None))))
            .set_json(serde_json::json!({
                "date": fixed_now().date(),
                "reason": "  "
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn holiday_edits_are_routed_to_the_engine() {
        let engine = app_engine().await;
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .app_data(engine)
                .configure(|cfg| configure(cfg, config())),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/holidays/999")
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {}", token(2, None))))
            .set_json(serde_json::json!({
                "date": "2026-05-04",
                "name": "Labour Day (observed)"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
