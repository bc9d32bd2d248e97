//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application:
//! the health probe, the WebSocket endpoint, and OpenAPI documentation.

use crate::{handlers, models::HealthResponse, state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health_check),
    components(schemas(HealthResponse)),
    tags(
        (name = "Front Desk Agent", description = "Voice-first front desk gateway. Live sessions use the WebSocket at /ws/{user_id}/{session_id}.")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ws/{user_id}/{session_id}", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
