use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use strongpoint_server::announce::CollectorSink;
use strongpoint_server::clock::SystemClock;
use strongpoint_server::constants::TICK_MS;
use strongpoint_server::engine::GameEngine;
use strongpoint_server::round_log::RoundLog;
use strongpoint_server::sensing::SharedPresenceSource;
use strongpoint_server::server_protocol::{parse_client_message, ParsedClientMessage};
use strongpoint_server::server_utils::{parse_limit, parse_role, ClientRole};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    role: ClientRole,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    engine: GameEngine,
    source: Arc<SharedPresenceSource>,
    announcements: CollectorSink,
    round_log: RoundLog,
}

impl ServerState {
    fn new() -> Self {
        let source = Arc::new(SharedPresenceSource::new());
        let announcements = CollectorSink::new();
        let engine = GameEngine::new(
            Arc::new(SystemClock::new()),
            source.clone(),
            Box::new(announcements.clone()),
        );
        Self {
            clients: HashMap::new(),
            engine,
            source,
            announcements,
            round_log: RoundLog::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoundsQuery {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    role: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let state = Arc::new(Mutex::new(ServerState::new()));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/state", get(state_handler))
        .route("/api/rounds", get(rounds_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        tracing::info!(path = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        tracing::warn!("static file root not found, serving API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    tracing::info!(port, "listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist/console"), PathBuf::from("../console")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn state_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let mut guard = state.lock().await;
    Json(guard.engine.snapshot(false))
}

async fn rounds_handler(
    State(state): State<SharedState>,
    Query(query): Query<RoundsQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(
        guard
            .round_log
            .build_response(parse_limit(query.limit.as_deref())),
    )
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<SharedState>,
) -> Response {
    let Some(role) = parse_role(query.role.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "unsupported role").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(state, socket, role))
}

async fn handle_socket(state: SharedState, socket: WebSocket, role: ClientRole) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                role,
            },
        );
        tracing::debug!(client = %client_id, role = role.label(), "client connected");
        send_welcome(&mut guard, &client_id);
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.clients.remove(&client_id);
        tracing::debug!(client = %client_id, "client disconnected");
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    let role = {
        let guard = state.lock().await;
        guard.clients.get(client_id).map(|ctx| ctx.role)
    };
    let Some(role) = role else {
        return;
    };

    match message {
        ParsedClientMessage::Ping { t } => {
            let mut guard = state.lock().await;
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::StartRound { config } => {
            if !role.may_command() {
                send_error_to_client(&state, client_id, "operator role required").await;
                return;
            }
            let mut guard = state.lock().await;
            if let Err(error) = guard.engine.start_round(config) {
                let text = error.to_string();
                send_to_client(
                    &mut guard,
                    client_id,
                    &json!({
                        "type": "error",
                        "message": text,
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
            }
        }
        ParsedClientMessage::StopRound => {
            if !role.may_command() {
                send_error_to_client(&state, client_id, "operator role required").await;
                return;
            }
            let mut guard = state.lock().await;
            guard.engine.stop_round();
        }
        ParsedClientMessage::Reset => {
            if !role.may_command() {
                send_error_to_client(&state, client_id, "operator role required").await;
                return;
            }
            let mut guard = state.lock().await;
            guard.engine.reset();
        }
        ParsedClientMessage::SensorReport { frame } => {
            if !role.may_report() {
                send_error_to_client(&state, client_id, "sensor role required").await;
                return;
            }
            let guard = state.lock().await;
            guard.source.publish(frame);
        }
        ParsedClientMessage::SetOverride { enabled, target } => {
            if !role.may_command() {
                send_error_to_client(&state, client_id, "operator role required").await;
                return;
            }
            let mut guard = state.lock().await;
            if let Some(enabled) = enabled {
                guard.engine.set_override_enabled(enabled);
            }
            if let Some(target) = target {
                guard
                    .engine
                    .set_override(target.index, target.team, target.active);
            }
        }
    }
}

fn send_welcome(state: &mut ServerState, client_id: &str) {
    let role = state
        .clients
        .get(client_id)
        .map(|ctx| ctx.role)
        .unwrap_or(ClientRole::Display);
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "welcome",
            "clientId": client_id,
            "role": role.label(),
        }),
        QueuePolicy::DisconnectOnFull,
    );

    let snapshot = state.engine.snapshot(false);
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn tick_game(state: &mut ServerState) {
    state.engine.step();
    let snapshot = state.engine.snapshot(true);
    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    for event in state.announcements.drain() {
        broadcast(
            state,
            &json!({
                "type": "announce",
                "event": event,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }

    if let Some(summary) = state.engine.take_summary() {
        let record = state.round_log.record(summary);
        broadcast(
            state,
            &json!({
                "type": "round_over",
                "record": record,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client_internal(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    let mut failed_clients = Vec::new();
    for client_id in client_ids {
        let Some(client) = state.clients.get(&client_id) else {
            continue;
        };
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id);
        }
    }
    for client_id in failed_clients {
        disconnect_client_internal(state, &client_id);
    }
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    if let Some(client) = state.clients.remove(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: 1008,
            reason: "outbound queue overflow".to_string(),
        });
        tracing::debug!(client = %client_id, "client dropped, queue overflow");
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
