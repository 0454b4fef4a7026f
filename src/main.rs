use anyhow::Result;
use axum::Router;
use outreach_reservations::{
    api,
    config::Config,
    controller,
    telemetry::{self, init_tracing},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside development
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;

    if cfg.auth.secret_is_placeholder() {
        anyhow::bail!(
            "SECURITY ERROR: OUTREACH__AUTH__JWT_SECRET must be set to a secure random value (min 32 chars). \
            Generate one with: openssl rand -base64 32"
        );
    }
    if cfg.auth.jwt_secret.len() < 32 {
        warn!("auth.jwt_secret is shorter than 32 characters");
    }

    let app_state = controller::AppState::new(cfg.clone()).await?;

    #[allow(unused_mut)]
    let mut app: Router = api::router(app_state, &cfg);

    #[cfg(feature = "metrics")]
    {
        app = api::with_metrics(app);
    }

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0; put it behind a reverse proxy with TLS");
    }

    info!(%addr, "starting outreach reservations");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
