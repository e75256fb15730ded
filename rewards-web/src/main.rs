// rewards-web/src/main.rs
mod api;
mod browser;
mod callback;
mod error;
mod middleware;
mod state;

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use common::{setup_tracing, Config};

use crate::middleware::RateLimiter;
use crate::state::AppState;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Rewards Center")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    setup_tracing();
    let config = Config::from_env();
    let server_addr = config.web_server_addr.clone();

    let state = AppState::build(&config).map_err(|e| {
        tracing::error!("Failed to start: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    match state.sessions().initialize().await {
        Ok(Some(session)) => tracing::info!("Signed in as {} ({})", session.display_name, session.user_id),
        Ok(None) => tracing::info!("No active session, waiting for login"),
        Err(e) => tracing::error!("Session restore failed: {}", e),
    }
    let _revalidation = state
        .sessions()
        .spawn_revalidation(config.identity.revalidate_every());

    let limiter = RateLimiter::new(
        config.rate_limit.paths.clone(),
        config.rate_limit.max_requests_per_minute,
    );
    let state = web::Data::new(state);

    tracing::info!("Starting Rewards Center on {} ({})", server_addr, config.public_origin);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(limiter.clone())
            .service(index)
            .service(callback::auth_callback)
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
