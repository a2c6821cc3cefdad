use crate::{
    api::{attendance, attendance_admin},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter allowing `requests_per_min` with a burst of the same size.
/// `None` when the resulting quota is unusable.
pub fn build_limiter(requests_per_min: u32) -> Option<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn attendance_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::post().to(attendance::open_session))
                    .route(web::put().to(attendance::close_session)),
            )
            .service(
                web::resource("/declaration")
                    .route(web::post().to(attendance::submit_declaration)),
            )
            // /attendance/day/{date}
            .service(
                web::resource("/day/{date}").route(web::put().to(attendance::set_day_outcome)),
            )
            .service(web::resource("/today").route(web::get().to(attendance::today)))
            .service(web::resource("/history").route(web::get().to(attendance::history)))
            .service(
                web::resource("/month/{year}/{month}").route(web::get().to(attendance::month)),
            ),
    )
    .service(
        web::scope("/admin/attendance")
            // /admin/attendance
            .service(
                web::resource("")
                    .route(web::get().to(attendance_admin::list_records))
                    .route(web::post().to(attendance_admin::create_record)),
            )
            // /admin/attendance/{id}
            .service(
                web::resource("/{id}")
                    .route(web::put().to(attendance_admin::update_record))
                    .route(web::delete().to(attendance_admin::delete_record)),
            ),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: Arc<Limiter>) {
    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiter) // rate limiting
            .configure(attendance_routes),
    );
}
