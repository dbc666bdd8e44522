//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Engine
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/sample/latest", get(handlers::latest_sample))

        // Rules
        .route(
            "/api/v1/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route(
            "/api/v1/rules/:rule_id",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route("/api/v1/rules/:rule_id/toggle", post(handlers::toggle_rule))

        // Notifications
        .route(
            "/api/v1/notifications",
            get(handlers::list_notifications).delete(handlers::clear_notifications),
        )
        .route("/api/v1/notifications/read", post(handlers::mark_all_read))
        .route(
            "/api/v1/notifications/:notification_id",
            axum::routing::delete(handlers::delete_notification),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(handlers::mark_read),
        )

        .with_state(state)
}
