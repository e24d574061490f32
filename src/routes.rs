use crate::api::attendance;
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, error::InternalError, web};
use anyhow::{Result, anyhow};
use serde_json::json;
use std::sync::Arc;

pub type RateLimiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
pub fn build_limiter(requests_per_min: u32) -> Result<RateLimiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))?;
    Ok(Governor::new(&cfg))
}

/// Malformed JSON bodies answer 400 in the same shape as validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        let resp = HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": message
        }));
        InternalError::from_response(err, resp).into()
    })
}

/// Attendance endpoints, relative to the API prefix.
pub fn attendance_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/attendance")
            .app_data(json_config())
            // /attendance
            .service(
                web::resource("")
                    .route(web::post().to(attendance::record_event))
                    .route(web::get().to(attendance::list_events)),
            )
            // /attendance/status?user_id=
            .service(web::resource("/status").route(web::get().to(attendance::get_status)))
            // /attendance/present
            .service(web::resource("/present").route(web::get().to(attendance::present_users)))
            // /attendance/leaves/pending
            .service(
                web::resource("/leaves/pending")
                    .route(web::get().to(attendance::list_pending_leaves)),
            )
            // /attendance/users/{user_id}/events
            .service(
                web::resource("/users/{user_id}/events")
                    .route(web::get().to(attendance::user_history)),
            )
            // /attendance/{id}/approve
            .service(
                web::resource("/{event_id}/approve")
                    .route(web::put().to(attendance::approve_leave)),
            )
            // /attendance/{id}/reject
            .service(
                web::resource("/{event_id}/reject")
                    .route(web::put().to(attendance::reject_leave)),
            ),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limiter: Arc<RateLimiter>) {
    cfg.service(
        web::scope(api_prefix)
            .wrap(limiter) // rate limiting
            .configure(attendance_routes),
    );
}
