// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The sandbox contract and [`BuiltinSandbox`], an in-process executor
//! for plugins with no WASM bytes. This implementation enforces the
//! timeout ceiling directly and tracks execution counters atomically. A
//! real sandbox (wasmtime, a subprocess with seccomp) can be dropped in
//! later behind the same trait without touching dispatch or action
//! interpretation.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::SandboxError;

use super::action::{PluginContext, PluginResponse};
use super::manifest::ResourceLimits;

pub type BuiltinScript =
    Arc<dyn Fn(PluginContext) -> Pin<Box<dyn Future<Output = PluginResponse> + Send>> + Send + Sync>;

/// Executes one plugin invocation under the manifest's resource limits.
#[async_trait]
pub trait PluginSandbox: Send + Sync {
    async fn execute(&self, context: PluginContext, limits: &ResourceLimits) -> Result<PluginResponse, SandboxError>;

    /// Cumulative counters, tracked atomically.
    fn memory_used(&self) -> u64;
    fn execution_count(&self) -> u64;
}

/// Runs a closure-based "script" under a wall-clock timeout. Memory/CPU
/// accounting is self-reported by the script (an in-process closure has
/// no OS-level isolation to measure against); a real sandbox backend
/// would measure these independently.
pub struct BuiltinSandbox {
    script: BuiltinScript,
    memory_used: AtomicU64,
    execution_count: AtomicU64,
}

impl BuiltinSandbox {
    pub fn new(script: BuiltinScript) -> Self {
        Self {
            script,
            memory_used: AtomicU64::new(0),
            execution_count: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PluginSandbox for BuiltinSandbox {
    async fn execute(&self, context: PluginContext, limits: &ResourceLimits) -> Result<PluginResponse, SandboxError> {
        if context.event_data.to_string().len() as u64 > limits.max_memory_bytes {
            return Err(SandboxError::MemoryLimitExceeded);
        }

        let result = tokio::time::timeout(limits.max_execution_time, (self.script)(context)).await;

        self.execution_count.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(response) => {
                self.memory_used
                    .fetch_add(estimate_response_size(&response), Ordering::SeqCst);
                Ok(response)
            }
            Err(_) => Err(SandboxError::Timeout),
        }
    }

    fn memory_used(&self) -> u64 {
        self.memory_used.load(Ordering::SeqCst)
    }

    fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::SeqCst)
    }
}

fn estimate_response_size(response: &PluginResponse) -> u64 {
    serde_json::to_vec(response).map(|bytes| bytes.len() as u64).unwrap_or(0)
}
