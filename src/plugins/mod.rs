// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plugin runtime (C6): loads `(guild, plugin)` instances, subscribes to
//! their hooks on the event bus, and dispatches to a [`sandbox::PluginSandbox`]
//! in a detached task per invocation so the bus is never blocked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{error, info};
use pubserve::Subscriber;
use tokio::sync::RwLock;

use crate::bus::EventBus;
use crate::errors::AmityResult;
use crate::types::utils::Ulid;
use crate::types::Event;

pub mod action;
pub mod manifest;
pub mod sandbox;

use action::{interpret, Effect, PluginContext};
use manifest::{Hook, PluginInstance};
use sandbox::PluginSandbox;

/// Applies an interpreted [`Effect`] to guild state. Implemented by the
/// storage/REST layer; the plugin runtime has no direct database access.
#[async_trait]
pub trait EffectSink: Send + Sync {
    async fn apply(&self, effect: Effect) -> AmityResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    Error,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct InvocationLog {
    pub id: Ulid,
    pub guild_id: Ulid,
    pub plugin_id: Ulid,
    pub hook: Hook,
    pub status: InvocationStatus,
    pub duration_ms: u128,
    pub memory_bytes: u64,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait InvocationLogSink: Send + Sync {
    async fn record(&self, log: InvocationLog) -> AmityResult<()>;
}

/// The loaded `(guild, plugin)` table, read-locked on the hot dispatch
/// path.
#[derive(Clone, Default)]
pub struct PluginTable {
    instances: Arc<RwLock<Vec<PluginInstance>>>,
}

impl PluginTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, instances: Vec<PluginInstance>) {
        *self.instances.write().await = instances;
    }

    async fn matching(&self, hook: Hook, guild_id: Ulid) -> Vec<PluginInstance> {
        self.instances
            .read()
            .await
            .iter()
            .filter(|i| i.enabled && i.guild_id == guild_id && i.manifest.hooks.contains(&hook))
            .cloned()
            .collect()
    }
}

/// Subscribes one [`Hook`] to its bus subject and dispatches matching
/// plugin instances to a sandbox, in a detached task per invocation.
pub struct PluginRuntime {
    table: PluginTable,
    sandbox: Arc<dyn PluginSandbox>,
    effects: Arc<dyn EffectSink>,
    logs: Arc<dyn InvocationLogSink>,
}

impl PluginRuntime {
    pub fn new(
        table: PluginTable,
        sandbox: Arc<dyn PluginSandbox>,
        effects: Arc<dyn EffectSink>,
        logs: Arc<dyn InvocationLogSink>,
    ) -> Self {
        Self { table, sandbox, effects, logs }
    }

    /// Subscribes every entry in the hook alphabet to its bus subject.
    pub async fn attach(self: &Arc<Self>, bus: &EventBus) {
        for hook in [
            Hook::MessageCreate,
            Hook::MessageUpdate,
            Hook::MessageDelete,
            Hook::MemberJoin,
            Hook::MemberLeave,
            Hook::GuildUpdate,
            Hook::Scheduled,
            Hook::ReactionAdd,
            Hook::ReactionRemove,
        ] {
            let handler = Arc::new(HookHandler { hook, runtime: self.clone() });
            bus.subscribe(hook.bus_subject(), handler).await;
        }
    }

    async fn dispatch(self: Arc<Self>, hook: Hook, event: Event) {
        let Some(guild_id) = event.guild_id else {
            return;
        };

        let instances = self.table.matching(hook, guild_id).await;
        for instance in instances {
            let runtime = self.clone();
            let event_data = event.data.clone();
            tokio::spawn(async move {
                runtime.invoke_one(hook, instance, event_data).await;
            });
        }
    }

    async fn invoke_one(&self, hook: Hook, instance: PluginInstance, event_data: serde_json::Value) {
        let context = PluginContext {
            guild_id: instance.guild_id,
            channel_id: None,
            user_id: None,
            hook_type: hook,
            event_data,
            config: instance.manifest.config_schema.clone(),
        };

        let started = Instant::now();
        let outcome = self.sandbox.execute(context, &instance.manifest.limits).await;
        let duration_ms = started.elapsed().as_millis();

        let (status, error_message, response) = match outcome {
            Ok(response) => (InvocationStatus::Success, None, Some(response)),
            Err(crate::errors::SandboxError::Timeout) => (InvocationStatus::Timeout, None, None),
            Err(err) => (InvocationStatus::Error, Some(err.to_string()), None),
        };

        if let Err(err) = self
            .logs
            .record(InvocationLog {
                id: Ulid::generate(),
                guild_id: instance.guild_id,
                plugin_id: instance.plugin_id,
                hook,
                status,
                duration_ms,
                memory_bytes: self.sandbox.memory_used(),
                error_message,
            })
            .await
        {
            error!("failed to record plugin invocation log: {err}");
        }

        if let Some(response) = response {
            let bot_user_id = if instance.is_builtin() { Some(instance.bot_user_id) } else { None };
            let effects = interpret(
                response,
                instance.manifest.limits.max_actions,
                instance.plugin_id,
                instance.guild_id,
                bot_user_id,
                instance.bot_user_id,
            );
            for effect in effects {
                if let Err(err) = self.effects.apply(effect).await {
                    error!("plugin {} effect application failed: {err}", instance.plugin_id);
                }
            }
        }
    }
}

struct HookHandler {
    hook: Hook,
    runtime: Arc<PluginRuntime>,
}

#[async_trait]
impl Subscriber<Event> for HookHandler {
    async fn update(&self, event: &Event) {
        self.runtime.clone().dispatch(self.hook, event.clone()).await;
    }
}

/// An [`EffectSink`] that only logs, useful for tests and for plugins
/// enabled in dry-run mode.
#[derive(Default)]
pub struct LoggingEffectSink;

#[async_trait]
impl EffectSink for LoggingEffectSink {
    async fn apply(&self, effect: Effect) -> AmityResult<()> {
        info!("plugin effect: {effect:?}");
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInvocationLogSink {
    logs: RwLock<HashMap<Ulid, Vec<InvocationLog>>>,
}

#[async_trait]
impl InvocationLogSink for InMemoryInvocationLogSink {
    async fn record(&self, log: InvocationLog) -> AmityResult<()> {
        self.logs.write().await.entry(log.plugin_id).or_default().push(log);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::action;
    use crate::plugins::action::PluginAction;
    use crate::plugins::manifest::{Manifest, ResourceLimits};
    use crate::plugins::sandbox::BuiltinSandbox;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EffectSink for CountingSink {
        async fn apply(&self, _effect: Effect) -> AmityResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn matching_hook_dispatches_to_enabled_instance_only() {
        let guild_id = Ulid::generate();
        let instance = PluginInstance {
            id: Ulid::generate(),
            guild_id,
            plugin_id: Ulid::generate(),
            bot_user_id: Ulid::generate(),
            manifest: Manifest {
                hooks: vec![Hook::MessageCreate],
                permissions: vec![],
                config_schema: json!({}),
                limits: ResourceLimits::default(),
            },
            wasm_bytes: None,
            enabled: true,
        };
        let table = PluginTable::new();
        table.load(vec![instance]).await;

        assert_eq!(table.matching(Hook::MessageCreate, guild_id).await.len(), 1);
        assert_eq!(table.matching(Hook::MemberJoin, guild_id).await.len(), 0);
        assert_eq!(table.matching(Hook::MessageCreate, Ulid::generate()).await.len(), 0);
    }

    #[tokio::test]
    async fn invocation_applies_interpreted_effects() {
        let guild_id = Ulid::generate();
        let bot_user_id = Ulid::generate();
        let plugin_id = Ulid::generate();
        let channel_id = Ulid::generate();

        let instance = PluginInstance {
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
        };

        let sandbox: Arc<dyn PluginSandbox> = Arc::new(BuiltinSandbox::new(Arc::new(move |_ctx| {
            let channel_id = channel_id;
            Box::pin(async move {
                action::PluginResponse {
                    actions: vec![PluginAction::SendMessage { channel_id, content: "hi".into() }],
                }
            })
        })));

        let count = Arc::new(AtomicUsize::new(0));
        let effects: Arc<dyn EffectSink> = Arc::new(CountingSink { count: count.clone() });
        let logs: Arc<dyn InvocationLogSink> = Arc::new(InMemoryInvocationLogSink::default());

        let runtime = Arc::new(PluginRuntime::new(PluginTable::new(), sandbox, effects, logs));
        runtime.invoke_one(Hook::MessageCreate, instance, json!({})).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
