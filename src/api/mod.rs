pub mod availability;
pub mod categories;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod health;
pub mod lecturers;
pub mod reservations;
pub mod response;
pub mod rules;
pub mod session;
pub mod settings;
pub mod slides;
pub mod subcategories;
pub mod subjects;
pub mod uploads;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, controller::AppState};

/// Room for multipart framing and text fields on top of the image itself
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Every `/api` route
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(session::routes())
        .merge(categories::routes())
        .merge(subcategories::routes())
        .merge(lecturers::routes())
        .merge(subjects::routes())
        .merge(rules::routes())
        .merge(settings::routes())
        .merge(slides::routes())
        .merge(reservations::routes())
        .merge(availability::routes())
        .merge(users::routes())
        .merge(dashboard::routes())
        .route("/health", get(health::health_check))
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .nest("/api", api_routes().with_state(state))
        .route("/healthz", get(health::liveness_check))
        .nest_service("/uploads", ServeDir::new(&cfg.uploads.dir));

    if cfg.server.enable_cors {
        match cfg.server.cors_origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(AllowOrigin::exact(origin))
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
                router = router.layer(cors);
            }
            Err(_) => {
                tracing::warn!(origin = %cfg.server.cors_origin, "invalid server.cors_origin, CORS disabled");
            }
        }
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(cfg.uploads.max_bytes + FORM_OVERHEAD_BYTES))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();

    let metrics_router =
        Router::new().route("/metrics", get(move || async move { handle.render() }));

    app.layer(layer).merge(metrics_router)
}
