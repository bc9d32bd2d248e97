//! Manages the WebSocket connection lifecycle for one live agent session.

use super::pump::{DownstreamExit, UpstreamExit, run_downstream, run_upstream};
use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use frontdesk_core::{LiveRequestQueue, SessionKey};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::{fmt::Display, sync::Arc};
use tokio::task::JoinError;
use tracing::{Instrument, debug, error, info, instrument};
use uuid::Uuid;

/// Lifecycle of one connection. Moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Connecting,
    Active,
    Draining,
    Closed,
}

/// How each pump ended. `None` means the pump never ran or panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionReport {
    pub upstream: Option<UpstreamExit>,
    pub downstream: Option<DownstreamExit>,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((user_id, session_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, session_id))
}

#[instrument(
    name = "ws_session",
    skip_all,
    fields(connection_id = %Uuid::new_v4(), user_id = %user_id, session_id = %session_id)
)]
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: String,
    session_id: String,
) {
    info!("New WebSocket connection.");
    let (socket_tx, socket_rx) = socket.split();
    let report = run_session(socket_rx, socket_tx, state, user_id, session_id).await;
    info!(?report, "WebSocket connection released.");
}

/// Drives one connection from handshake to teardown.
///
/// Whichever pump finishes first moves the session to draining: the request
/// queue is closed, which ends the agent's event stream and with it the
/// downstream pump, and the other pump is awaited rather than aborted.
pub async fn run_session<R, W>(
    socket_rx: R,
    mut socket_tx: W,
    state: Arc<AppState>,
    user_id: String,
    session_id: String,
) -> SessionReport
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
{
    transition(GatewayState::Connecting);
    let key = SessionKey::new(state.config.app_name.clone(), user_id, session_id);
    let session = state.sessions.get_or_create(key).await;

    let (queue, requests) = LiveRequestQueue::channel();
    let queue = Arc::new(queue);
    let events = match state.runtime.run_live(session, requests).await {
        Ok(events) => events,
        Err(e) => {
            error!(error = ?e, "Failed to start the agent runtime");
            queue.close();
            if let Err(e) = socket_tx.close().await {
                debug!(error = %e, "Client socket already closed");
            }
            transition(GatewayState::Closed);
            return SessionReport::default();
        }
    };

    transition(GatewayState::Active);
    let upstream_queue = queue.clone();
    let mut upstream = tokio::spawn(
        async move { run_upstream(socket_rx, &upstream_queue).await }.in_current_span(),
    );
    let mut downstream = tokio::spawn(run_downstream(events, socket_tx).in_current_span());

    let report = tokio::select! {
        result = &mut upstream => {
            let upstream = pump_exit("upstream", result);
            info!(exit = ?upstream, "Upstream pump finished first.");
            transition(GatewayState::Draining);
            queue.close();
            SessionReport { upstream, downstream: pump_exit("downstream", downstream.await) }
        }
        result = &mut downstream => {
            let downstream = pump_exit("downstream", result);
            info!(exit = ?downstream, "Downstream pump finished first.");
            transition(GatewayState::Draining);
            queue.close();
            SessionReport { upstream: pump_exit("upstream", upstream.await), downstream }
        }
    };

    transition(GatewayState::Closed);
    report
}

fn transition(to: GatewayState) {
    info!(state = ?to, "Gateway state changed.");
}

fn pump_exit<T>(pump: &str, result: Result<T, JoinError>) -> Option<T> {
    result
        .inspect_err(|e| error!(pump, error = %e, "Pump task failed"))
        .ok()
}
