// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-module flows that no single module's unit tests exercise: one
//! event published on the bus reaching both a gateway session and the
//! plugin runtime, and the plugin runtime's interpreted effect landing
//! through a real [`PluginTable`] lookup rather than a synthetic call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pubserve::Subscriber;
use serde_json::json;

use amityvox::bus::EventBus;
use amityvox::errors::{AmityError, AmityResult};
use amityvox::gateway::{GatewayRegistry, SessionAuthenticator};
use amityvox::plugins::action::{Effect, PluginAction, PluginResponse};
use amityvox::plugins::manifest::{Hook, Manifest, PluginInstance, ResourceLimits};
use amityvox::plugins::sandbox::BuiltinSandbox;
use amityvox::plugins::{EffectSink, InMemoryInvocationLogSink, PluginRuntime, PluginTable};
use amityvox::types::utils::Ulid;
use amityvox::types::Event;

struct StaticAuth(Ulid, HashSet<Ulid>);

#[async_trait]
impl SessionAuthenticator for StaticAuth {
    async fn authenticate(&self, token: &str) -> AmityResult<(Ulid, HashSet<Ulid>)> {
        if token == "valid" {
            Ok((self.0, self.1.clone()))
        } else {
            Err(AmityError::Unauthenticated)
        }
    }
}

/// Bridges the bus to the gateway registry the way a real server's
/// connection-accept loop would: every bus event is handed to
/// `GatewayRegistry::dispatch` so subscribed sessions receive it.
struct GatewayBridge(GatewayRegistry);

#[async_trait]
impl Subscriber<Event> for GatewayBridge {
    async fn update(&self, event: &Event) {
        self.0.dispatch(event).await;
    }
}

#[tokio::test]
async fn published_event_reaches_a_subscribed_gateway_session() {
    let bus = EventBus::new();
    let registry = GatewayRegistry::new();

    let guild_id = Ulid::generate();
    let mut guilds = HashSet::new();
    guilds.insert(guild_id);
    let auth = StaticAuth(Ulid::generate(), guilds);

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    registry.identify(&auth, "valid", tx).await.expect("identify succeeds");

    bus.subscribe("amityvox.>", Arc::new(GatewayBridge(registry.clone()))).await;

    let event = Event::new("amityvox.message.create", "MESSAGE_CREATE", json!({ "content": "hi" }))
        .with_guild(guild_id);
    bus.publish(&event.subject.clone(), event).await;
    bus.close().await;

    let dispatched = rx.recv().await.expect("gateway session receives the dispatched frame");
    assert_eq!(dispatched.event_type.as_deref(), Some("MESSAGE_CREATE"));
    assert_eq!(dispatched.sequence, Some(1));
}

#[tokio::test]
async fn message_create_event_drives_a_plugin_effect_through_the_bus() {
    let bus = EventBus::new();

    let guild_id = Ulid::generate();
    let bot_user_id = Ulid::generate();
    let plugin_id = Ulid::generate();
    let reply_channel = Ulid::generate();

    let table = PluginTable::new();
    table
        .load(vec![PluginInstance {
            id: Ulid::generate(),
            guild_id,
            plugin_id,
            bot_user_id,
            manifest: Manifest {
                hooks: vec![Hook::MessageCreate],
                permissions: vec![],
                config_schema: json!({}),
                limits: ResourceLimits::default(),
            },
            wasm_bytes: None,
            enabled: true,
        }])
        .await;

    let sandbox: Arc<dyn amityvox::plugins::sandbox::PluginSandbox> =
        Arc::new(BuiltinSandbox::new(Arc::new(move |_ctx| {
            Box::pin(async move {
                PluginResponse {
                    actions: vec![PluginAction::SendMessage { channel_id: reply_channel, content: "auto-reply".into() }],
                }
            })
        })));

    let count = Arc::new(AtomicUsize::new(0));
    struct CountingSink {
        count: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl EffectSink for CountingSink {
        async fn apply(&self, effect: Effect) -> AmityResult<()> {
            assert!(matches!(effect, Effect::CreateMessage { .. }));
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let runtime = Arc::new(PluginRuntime::new(
        table,
        sandbox,
        Arc::new(CountingSink { count: count.clone() }),
        Arc::new(InMemoryInvocationLogSink::default()),
    ));
    runtime.attach(&bus).await;

    let event = Event::new("amityvox.message.create", "MESSAGE_CREATE", json!({ "content": "hello" }))
        .with_guild(guild_id);
    bus.publish(&event.subject.clone(), event).await;
    bus.close().await;

    // plugin dispatch spawns a detached task per invocation; give it a
    // beat to run after the bus itself has drained.
    for _ in 0..50 {
        if count.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
