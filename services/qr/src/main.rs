use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use lk_core::config::Config;
use lk_core::tracing::init_tracing;
use lk_qr::config::QrConfig;
use lk_qr::infra::cache::QrCache;
use lk_qr::infra::whatsapp::WhatsAppClient;
use lk_qr::router::build_router;
use lk_qr::state::AppState;
use lk_vision::scanner::QrScanner;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = QrConfig::from_env().expect("failed to load configuration");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let cache = QrCache::new(config.cache_ttl());
    let sweeper = cache.spawn_sweeper(config.cache_sweep_interval());

    let whatsapp = WhatsAppClient::new(
        &config.whatsapp_api_url,
        &config.whatsapp_phone_number_id,
        &config.whatsapp_access_token,
    )
    .expect("failed to build WhatsApp client");

    let scanner = QrScanner::with_default_decoders(config.scan_options());
    let addr = format!("0.0.0.0:{}", config.qr_port);

    let state = AppState {
        db,
        config: Arc::new(config),
        cache,
        scanner: Arc::new(scanner),
        whatsapp,
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("qr service listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    sweeper.abort();
    info!("qr service stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
