use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use lk_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    cache::{cache_stats, clear_cache},
    detect::{batch_detect, detect},
    health::{healthz, readyz},
    notification::{get_whatsapp_notification, send_whatsapp},
    qr::{batch_generate, batch_validate, generate_student_qr, validate_code},
    token::{ensure_token, rotate_token, validate_portal_url},
};
use crate::state::AppState;

/// Upper bound for photo uploads on the detection routes.
pub const DETECT_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let detection = Router::new()
        .route("/qr/detect", post(detect))
        .route("/qr/detect/batch", post(batch_detect))
        .layer(DefaultBodyLimit::max(DETECT_BODY_LIMIT));

    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Tokens
        .route("/tokens/students/{student_id}", post(ensure_token))
        .route("/tokens/students/{student_id}/rotate", post(rotate_token))
        .route("/portal/validate", get(validate_portal_url))
        // QR generation and validation
        .route("/qr/students/{student_id}", post(generate_student_qr))
        .route("/qr/batch", post(batch_generate))
        .route("/qr/validate", post(validate_code))
        .route("/qr/validate/batch", post(batch_validate))
        // Cache
        .route("/qr/cache/stats", get(cache_stats))
        .route("/qr/cache", delete(clear_cache))
        // Notifications
        .route("/notifications/whatsapp", post(send_whatsapp))
        .route("/notifications/whatsapp/{id}", get(get_whatsapp_notification))
        .merge(detection)
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(request_id_layer())
        .with_state(state)
}
