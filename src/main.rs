//! # CallShield Backend - Main Application Entry Point
//!
//! Actix-web server for scam call analysis. Routes:
//!
//! - `GET /` and `GET /health`: liveness and service status
//! - `POST /api/analyze/audio`: single-shot recording analysis
//! - `POST /api/analyze/text`: single-shot transcript analysis
//! - `GET /api/config`, `GET /api/metrics`: operational introspection
//! - `GET /ws/stream`: live streaming analysis session
//!
//! The `/api` scope sits behind API key auth (open when no keys are
//! configured); the stream endpoint checks its key during the upgrade.

mod analysis;
mod auth;
mod config;
mod demo;
mod error;
mod handlers;
mod health;
mod middleware;
mod schemas;
mod scoring;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Result;
use auth::{ApiKeyAuth, ApiKeys};
use config::AppConfig;
use scoring::ScoringClient;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let app_config = AppConfig::load()?;
    app_config.validate()?;

    info!("Starting callshield-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {}:{}",
        app_config.server.host, app_config.server.port
    );

    // Build the scoring client once; all sessions share it. No key means
    // demo mode with canned responses.
    let scorer: Option<Arc<ScoringClient>> = if app_config.demo_mode() {
        warn!("No scoring API key configured; serving canned demo responses");
        None
    } else {
        info!(
            "Scoring against {} ({} / {})",
            app_config.scoring.base_url,
            app_config.scoring.audio_model,
            app_config.scoring.text_model
        );
        Some(Arc::new(ScoringClient::new(&app_config.scoring)?))
    };

    let api_keys = ApiKeys::load(&app_config.auth.keys_file);
    let app_state = AppState::new(app_config.clone());
    let bind_addr = format!("{}:{}", app_config.server.host, app_config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(api_keys.clone()))
            .app_data(web::Data::new(scorer.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .route("/", web::get().to(root_status))
            .route("/health", web::get().to(health::health_check))
            .route("/ws/stream", web::get().to(websocket::stream_websocket))
            .service(
                web::scope("/api")
                    .wrap(ApiKeyAuth)
                    .route("/analyze/audio", web::post().to(handlers::analyze_audio))
                    .route("/analyze/text", web::post().to(handlers::analyze_text))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/metrics", web::get().to(health::detailed_metrics)),
            )
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

async fn root_status() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "CallShield Scam Detector API"
    }))
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callshield_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the shutdown flag so current
/// requests can finish before the process exits.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
