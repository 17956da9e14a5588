//! # Gesture Coach Backend - Main Application Entry Point
//!
//! Sets up the Actix-web server hosting the gesture relay:
//!
//! ## Application Architecture:
//! - **config**: TOML file + environment variable configuration
//! - **state**: shared application state and request metrics
//! - **relay**: session registry, frame coalescing, verdict routing
//! - **worker**: bridge to the external inference process
//! - **websocket**: one actor per `/ws/gesture` connection
//! - **health / handlers**: HTTP endpoints around the real-time core
//!
//! Startup order matters: the worker bridge and registry exist before the
//! server accepts connections, and the heartbeat tick task owns all
//! time-based maintenance (liveness probes, stale eviction, worker request
//! expiry).

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use gesture_coach_backend::config::AppConfig;
use gesture_coach_backend::relay::{self, registry::SessionRegistry};
use gesture_coach_backend::state::AppState;
use gesture_coach_backend::worker::WorkerBridge;
use gesture_coach_backend::{handlers, health, middleware, websocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown signal, set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!(
        "Starting gesture-coach-backend v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Configuration loaded: {}:{}",
        config.server.host, config.server.port
    );

    let app_state = AppState::new(config.clone());
    let registry = Arc::new(SessionRegistry::new(config.session.max_sessions));
    let bridge = WorkerBridge::new(config.worker.clone());

    // Verdicts route back to their owning session, then the freed worker
    // slot is immediately offered the next pending frame.
    {
        let registry = registry.clone();
        let bridge_handle = Arc::downgrade(&bridge);
        bridge.set_verdict_handler(Arc::new(move |verdict| {
            registry.on_verdict(verdict);
            if let Some(bridge) = bridge_handle.upgrade() {
                let registry = registry.clone();
                tokio::spawn(async move {
                    relay::pump(&registry, &bridge).await;
                });
            }
        }));
    }

    // A missing worker is degraded service, not a startup failure: the
    // bridge respawns it lazily on the next dispatch attempt.
    if let Err(err) = bridge.start().await {
        warn!("Inference worker unavailable at startup: {}", err);
    }

    let heartbeat_interval = Duration::from_secs(config.session.heartbeat_interval_secs);
    let request_timeout = Duration::from_millis(config.worker.request_timeout_ms);
    tokio::spawn(relay::run_tick_loop(
        registry.clone(),
        bridge.clone(),
        heartbeat_interval,
        request_timeout,
    ));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

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
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(bridge.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .route("/ws/gesture", web::get().to(websocket::gesture_websocket))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
            .service(
                web::scope("/api/gestures")
                    .route("", web::get().to(handlers::list_gestures))
                    .route(
                        "/{letter}/instructions",
                        web::get().to(handlers::gesture_instructions),
                    ),
            )
            .route("/api/status", web::get().to(handlers::service_status))
            .route("/health", web::get().to(health::health_check))
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

/// Initialize the tracing (logging) system.
///
/// `RUST_LOG` controls the filter; the default keeps this crate at debug
/// and the framework at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_coach_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and set the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

/// Resolve once the shutdown flag is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
