// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gateway sessions (C4): the WebSocket opcode state machine, backed by
//! the process-wide session registry every accepted connection registers
//! itself into.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use crate::errors::{AmityError, AmityResult, GatewayCloseError};
use crate::types::utils::Ulid;
use crate::types::Event;

pub mod heartbeat;
pub mod message;
pub mod opcodes;
pub mod session;

pub use message::GatewayMessage;
pub use session::Session;

/// Jittered around 30s; jitter keeps reconnect storms from synchronizing
/// every client's heartbeat tick.
pub fn hello_interval() -> Duration {
    use rand::Rng;
    let jitter_ms = rand::thread_rng().gen_range(0..2000);
    Duration::from_millis(30_000 + jitter_ms)
}

/// Upper bound on how long a freshly-accepted connection may stay
/// un-identified before being dropped with 4003.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves a bearer token to the identity a successful Identify/Resume
/// needs. Implemented over [`crate::types::UserSession`] by the storage
/// layer; kept as a trait so gateway logic has no direct database
/// dependency.
#[async_trait::async_trait]
pub trait SessionAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> AmityResult<(Ulid, HashSet<Ulid>)>;
}

/// The process-wide table of live gateway sessions, keyed by
/// `session_id`. Cheap to clone: internally an `Arc`.
#[derive(Clone)]
pub struct GatewayRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handles Op 2 Identify: validates the token, allocates a session
    /// and registers it. Returns the session id and the joined guild set
    /// the caller needs to build the `READY` dispatch.
    pub async fn identify(
        &self,
        auth: &dyn SessionAuthenticator,
        token: &str,
        sender: mpsc::Sender<GatewayMessage>,
    ) -> Result<(String, Ulid, HashSet<Ulid>), GatewayCloseError> {
        let (user_id, guild_ids) = auth
            .authenticate(token)
            .await
            .map_err(|_| GatewayCloseError::AuthenticationFailed)?;

        let session = Session::new(user_id, token.to_string(), guild_ids.clone(), sender);
        let session_id = session.session_id.clone();
        self.sessions.write().await.insert(session_id.clone(), session);
        Ok((session_id, user_id, guild_ids))
    }

    /// Handles Op 5 Resume.
    pub async fn resume(
        &self,
        session_id: &str,
        token: &str,
        seq: u64,
    ) -> Result<Vec<GatewayMessage>, GatewayCloseError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or(GatewayCloseError::InvalidSequence)?;
        session.resume(token, seq)
    }

    pub async fn mark_disconnected(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.mark_disconnected();
        }
    }

    /// Drops sessions that fell outside the resume window; called
    /// periodically so a server that never restarts doesn't accumulate
    /// dead entries forever.
    pub async fn sweep_expired(&self) {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.is_resumable() || session.current_seq() == 0);
    }

    pub async fn subscribe_channel(&self, session_id: &str, channel_id: Ulid) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.subscribed_channel_ids.insert(channel_id);
        }
    }

    /// Fans `event` out to every session whose subscription set matches.
    /// Sessions that hit [`GatewayCloseError::Backpressure`] are removed
    /// from the registry;
    /// the caller is responsible for actually closing their socket with
    /// that code (the registry has no handle to the socket itself).
    pub async fn dispatch(&self, event: &Event) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let mut backpressured = Vec::new();

        for (session_id, session) in sessions.iter_mut() {
            if !session.is_subscribed(event.user_id, event.guild_id, event.channel_id) {
                continue;
            }
            if session
                .dispatch(&event.event_type, event.data.clone())
                .await
                .is_err()
            {
                backpressured.push(session_id.clone());
            }
        }

        for session_id in &backpressured {
            sessions.remove(session_id);
        }

        backpressured
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Per-channel typing debounce: maps `channel_id` to the instant the
/// last `amityvox.typing.start` publish expires, so repeated Typing
/// opcodes within the debounce window don't re-publish.
#[derive(Clone, Default)]
pub struct TypingDebounce {
    expires_at: Arc<RwLock<HashMap<Ulid, tokio::time::Instant>>>,
}

/// Clients are expected to locally expire a typing indicator after this
/// long; re-publishing before then is redundant.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(10);

impl TypingDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a `amityvox.typing.start` should actually be
    /// published for `channel_id` right now.
    pub async fn should_publish(&self, channel_id: Ulid) -> bool {
        let now = tokio::time::Instant::now();
        let mut map = self.expires_at.write().await;
        match map.get(&channel_id) {
            Some(expires) if *expires > now => false,
            _ => {
                map.insert(channel_id, now + TYPING_EXPIRY);
                true
            }
        }
    }
}

impl From<GatewayCloseError> for AmityError {
    fn from(value: GatewayCloseError) -> Self {
        AmityError::Internal {
            reason: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticAuth(Ulid, HashSet<Ulid>);

    #[async_trait::async_trait]
    impl SessionAuthenticator for StaticAuth {
        async fn authenticate(&self, token: &str) -> AmityResult<(Ulid, HashSet<Ulid>)> {
            if token == "valid" {
                Ok((self.0, self.1.clone()))
            } else {
                Err(AmityError::Unauthenticated)
            }
        }
    }

    #[tokio::test]
    async fn identify_registers_a_session() {
        let registry = GatewayRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let auth = StaticAuth(Ulid::generate(), HashSet::new());
        let (session_id, _user, _guilds) = registry
            .identify(&auth, "valid", tx)
            .await
            .expect("identify succeeds");
        assert_eq!(registry.session_count().await, 1);
        assert!(!session_id.is_empty());
    }

    #[tokio::test]
    async fn identify_with_bad_token_fails() {
        let registry = GatewayRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let auth = StaticAuth(Ulid::generate(), HashSet::new());
        let err = registry.identify(&auth, "bad", tx).await.unwrap_err();
        assert_eq!(err, GatewayCloseError::AuthenticationFailed);
    }

    #[tokio::test]
    async fn typing_debounce_suppresses_repeats() {
        let debounce = TypingDebounce::new();
        let channel = Ulid::generate();
        assert!(debounce.should_publish(channel).await);
        assert!(!debounce.should_publish(channel).await);
    }
}
