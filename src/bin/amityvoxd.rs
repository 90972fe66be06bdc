// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wires the event bus, gateway registry, webhook engine and plugin
//! runtime together behind a minimal `poem` WebSocket listener. The
//! REST surface isn't implemented here; this binary only demonstrates
//! the gateway accept loop (C4), which is genuinely part of the core.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use amityvox::bus::EventBus;
use amityvox::config::Config;
use amityvox::errors::AmityResult;
use amityvox::gateway::message::{GatewayMessage, IdentifyPayload, ReadyPayload, ResumePayload, SubscribePayload};
use amityvox::gateway::opcodes;
use amityvox::gateway::{GatewayRegistry, SessionAuthenticator};
use amityvox::plugins::sandbox::{BuiltinSandbox, PluginSandbox};
use amityvox::plugins::{EffectSink, InMemoryInvocationLogSink, InvocationLogSink, LoggingEffectSink, PluginRuntime, PluginTable};
use amityvox::types::utils::Ulid;
use amityvox::webhooks::WebhookEngine;
use amityvox::webhooks::store::InMemoryWebhookStore;

use log::{error, info, warn};
use poem::listener::TcpListener;
use poem::web::websocket::{Message, WebSocket};
use poem::{get, handler, EndpointExt, IntoResponse, Route, Server};
use tokio::sync::mpsc;

const CONFIG_PATH: &str = "amityvox.toml";

/// A `SessionAuthenticator` that accepts any non-empty bearer token and
/// joins no guilds. Stand-in until a real user/session store lands;
/// every production deployment must replace this before exposing the
/// gateway publicly.
struct OpenAuthenticator;

#[async_trait::async_trait]
impl SessionAuthenticator for OpenAuthenticator {
    async fn authenticate(&self, token: &str) -> AmityResult<(Ulid, HashSet<Ulid>)> {
        if token.is_empty() {
            return Err(amityvox::errors::AmityError::Unauthenticated);
        }
        Ok((Ulid::generate(), HashSet::new()))
    }
}

struct AppState {
    registry: GatewayRegistry,
    auth: Arc<dyn SessionAuthenticator>,
    config: Config,
}

#[handler]
fn gateway_ws(ws: WebSocket, data: poem::web::Data<&Arc<AppState>>) -> impl IntoResponse {
    let state = data.0.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(err) = run_session(state, socket).await {
            warn!("gateway session ended with error: {err}");
        }
    })
}

async fn run_session(
    state: Arc<AppState>,
    socket: poem::web::websocket::WebSocketStream,
) -> AmityResult<()> {
    use futures_util::{SinkExt, StreamExt};

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<GatewayMessage>(64);

    let hello = GatewayMessage::new(
        opcodes::OP_HELLO,
        serde_json::to_value(amityvox::gateway::message::HelloPayload {
            heartbeat_interval: state.config.gateway.heartbeat_interval_ms,
        })
        .unwrap(),
    );
    sink.send(Message::text(serde_json::to_string(&hello).unwrap())).await.ok();

    let mut session_id: Option<String> = None;

    let identify_deadline = tokio::time::sleep(state.config.gateway.identify_timeout());
    tokio::pin!(identify_deadline);

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if sink.send(Message::text(serde_json::to_string(&message).unwrap())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                let Ok(parsed) = serde_json::from_str::<GatewayMessage>(&text) else { continue };

                match parsed.op {
                    opcodes::OP_IDENTIFY if session_id.is_none() => {
                        let Ok(payload) = serde_json::from_value::<IdentifyPayload>(parsed.d) else { continue };
                        match state.registry.identify(state.auth.as_ref(), &payload.token, tx.clone()).await {
                            Ok((new_session_id, user_id, guild_ids)) => {
                                session_id = Some(new_session_id.clone());
                                let ready = GatewayMessage::new(
                                    opcodes::OP_DISPATCH,
                                    serde_json::to_value(ReadyPayload {
                                        session_id: new_session_id,
                                        user_id,
                                        guild_ids: guild_ids.into_iter().collect(),
                                    })
                                    .unwrap(),
                                );
                                sink.send(Message::text(serde_json::to_string(&ready).unwrap())).await.ok();
                            }
                            Err(close) => {
                                sink.close().await.ok();
                                warn!("identify failed: {close}");
                                break;
                            }
                        }
                    }
                    opcodes::OP_RESUME => {
                        let Ok(payload) = serde_json::from_value::<ResumePayload>(parsed.d) else { continue };
                        match state.registry.resume(&payload.session_id, &payload.token, payload.seq).await {
                            Ok(replay) => {
                                session_id = Some(payload.session_id);
                                for message in replay {
                                    sink.send(Message::text(serde_json::to_string(&message).unwrap())).await.ok();
                                }
                            }
                            Err(close) => {
                                sink.close().await.ok();
                                warn!("resume failed: {close}");
                                break;
                            }
                        }
                    }
                    opcodes::OP_SUBSCRIBE => {
                        if let (Some(session_id), Ok(payload)) = (&session_id, serde_json::from_value::<SubscribePayload>(parsed.d)) {
                            state.registry.subscribe_channel(session_id, payload.channel_id).await;
                        }
                    }
                    opcodes::OP_HEARTBEAT => {
                        let ack = GatewayMessage::new(opcodes::OP_HEARTBEAT_ACK, serde_json::Value::Null);
                        sink.send(Message::text(serde_json::to_string(&ack).unwrap())).await.ok();
                    }
                    _ => {}
                }
            }
            _ = &mut identify_deadline, if session_id.is_none() => {
                sink.close().await.ok();
                break;
            }
        }
    }

    if let Some(session_id) = session_id {
        state.registry.mark_disconnected(&session_id).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::load_or_default(CONFIG_PATH);
    info!("starting {} on {}", config.general.instance_name, config.general.domain);

    let bus = EventBus::new();

    let webhook_store = Arc::new(InMemoryWebhookStore::new());
    match WebhookEngine::new(webhook_store) {
        Ok(engine) => {
            let engine = Arc::new(engine);
            engine.attach(&bus).await;
        }
        Err(err) => error!("failed to start webhook engine: {err}"),
    }

    let plugin_table = PluginTable::new();
    // No plugin instances loaded yet: a real deployment calls
    // `plugin_table.load(..)` once it has a store to read them from.
    let sandbox: Arc<dyn PluginSandbox> =
        Arc::new(BuiltinSandbox::new(Arc::new(|_ctx| Box::pin(async { Default::default() }))));
    let effects: Arc<dyn EffectSink> = Arc::new(LoggingEffectSink);
    let logs: Arc<dyn InvocationLogSink> = Arc::new(InMemoryInvocationLogSink::default());
    let runtime = Arc::new(PluginRuntime::new(plugin_table, sandbox, effects, logs));
    runtime.attach(&bus).await;

    let registry = GatewayRegistry::new();
    let sweep_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            sweep_registry.sweep_expired().await;
        }
    });

    let state = Arc::new(AppState {
        registry,
        auth: Arc::new(OpenAuthenticator),
        config,
    });

    let app = Route::new().at("/gateway", get(gateway_ws)).data(state);

    Server::new(TcpListener::bind("0.0.0.0:8080")).run(app).await
}
