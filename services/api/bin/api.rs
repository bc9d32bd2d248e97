//! Main Entrypoint for the Front Desk API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the system prompt and the toolbox's tool declarations.
//! 3. Initializing shared services (session registry and agent runtime).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use frontdesk_api::{
    config::{Config, RuntimeKind, load_system_instruction},
    router::create_router,
    state::AppState,
};
use frontdesk_core::{
    AgentRuntime, InMemorySessionService,
    runtime::{echo::EchoRuntime, gemini::GeminiLiveRuntime},
    toolbox::{ToolExecutor, ToolboxClient},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads the toolset, falling back to no tools when the toolbox is unreachable.
async fn load_tools(config: &Config) -> Arc<dyn ToolExecutor> {
    match ToolboxClient::load(&config.toolbox_url, &config.toolset).await {
        Ok(client) => {
            info!(
                toolset = %config.toolset,
                tools = client.declarations().len(),
                "Loaded tools from toolbox."
            );
            Arc::new(client)
        }
        Err(e) => {
            warn!(
                error = ?e,
                toolbox_url = %config.toolbox_url,
                "Could not load tools from toolbox. Continuing without tools."
            );
            Arc::new(ToolboxClient::empty(config.toolbox_url.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let system_instruction = load_system_instruction(&config.prompts_path).with_context(|| {
        format!(
            "Failed to read system prompt from {}",
            config.prompts_path.display()
        )
    })?;
    if system_instruction.is_empty() {
        warn!("No system prompt found; the agent runs without instructions.");
    }

    let runtime: Arc<dyn AgentRuntime> = match &config.runtime {
        RuntimeKind::Gemini => {
            info!("Using Gemini Live runtime.");
            let api_key = config
                .gemini_api_key
                .clone()
                .context("GEMINI_API_KEY must be set for the 'gemini' runtime")?;
            let tools = load_tools(&config).await;
            Arc::new(GeminiLiveRuntime::new(
                api_key,
                config.live_model.clone(),
                system_instruction,
                tools,
            ))
        }
        RuntimeKind::Echo => {
            info!("Using echo runtime.");
            Arc::new(EchoRuntime)
        }
    };

    let app_state = Arc::new(AppState {
        sessions: Arc::new(InMemorySessionService::new()),
        runtime,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        app_name = %config.app_name,
        runtime = ?config.runtime,
        model = %config.live_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    info!(
        "WebSocket endpoint: ws://{}/ws/{{user_id}}/{{session_id}}",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
