// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-connection gateway session state: sequence counter, replay
//! buffer, subscription set and the backpressure-aware dispatch path.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use rand::RngCore;
use serde_json::Value;
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;

use crate::errors::GatewayCloseError;
use crate::types::utils::Ulid;

use super::message::GatewayMessage;

/// Ring buffer of the last [`REPLAY_BUFFER_SIZE`] dispatched events,
/// keyed by sequence number, for [`Session::resume`].
const REPLAY_BUFFER_SIZE: usize = 256;

/// Upper bound on how long a session may sit un-resumed after
/// disconnect and still replay.
pub const RESUME_WINDOW: Duration = Duration::from_secs(120);

/// Upper bound on a single dispatch send before the session is
/// considered backed up.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a heartbeat may go unrefreshed before the session is
/// dropped: `2 * heartbeat_interval`.
pub const HEARTBEAT_ACK_MULTIPLIER: u32 = 2;

struct ReplayBuffer {
    entries: VecDeque<(u64, GatewayMessage)>,
}

impl ReplayBuffer {
    fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(REPLAY_BUFFER_SIZE),
        }
    }

    fn push(&mut self, seq: u64, message: GatewayMessage) {
        if self.entries.len() >= REPLAY_BUFFER_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back((seq, message));
    }

    fn first_replayable_seq(&self) -> Option<u64> {
        self.entries.front().map(|(seq, _)| *seq)
    }

    fn replay_after(&self, seq: u64) -> Vec<GatewayMessage> {
        self.entries
            .iter()
            .filter(|(s, _)| *s > seq)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A live or recently-disconnected gateway session.
pub struct Session {
    pub session_id: String,
    pub user_id: Ulid,
    pub token: String,
    pub joined_guild_ids: HashSet<Ulid>,
    pub subscribed_channel_ids: HashSet<Ulid>,
    seq: u64,
    replay: ReplayBuffer,
    sender: Sender<GatewayMessage>,
    last_heartbeat_at: Instant,
    disconnected_at: Option<Instant>,
}

impl Session {
    pub fn new(
        user_id: Ulid,
        token: String,
        joined_guild_ids: HashSet<Ulid>,
        sender: Sender<GatewayMessage>,
    ) -> Self {
        Self {
            session_id: generate_session_id(),
            user_id,
            token,
            joined_guild_ids,
            subscribed_channel_ids: HashSet::new(),
            seq: 0,
            replay: ReplayBuffer::new(),
            sender,
            last_heartbeat_at: Instant::now(),
            disconnected_at: None,
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.seq
    }

    /// Whether this session's subscription set would receive an event
    /// with the given scoping.
    pub fn is_subscribed(
        &self,
        event_user_id: Option<Ulid>,
        event_guild_id: Option<Ulid>,
        event_channel_id: Option<Ulid>,
    ) -> bool {
        if event_user_id == Some(self.user_id) {
            return true;
        }
        if let Some(guild_id) = event_guild_id {
            if self.joined_guild_ids.contains(&guild_id) {
                return true;
            }
        }
        if let Some(channel_id) = event_channel_id {
            if self.subscribed_channel_ids.contains(&channel_id) {
                return true;
            }
        }
        false
    }

    /// Increments `seq`, buffers and sends a Dispatch frame. Returns
    /// [`GatewayCloseError::Backpressure`] if the send doesn't complete
    /// within [`SEND_TIMEOUT`]; the caller must close the session with
    /// that error's close code.
    pub async fn dispatch(&mut self, event_type: &str, data: Value) -> Result<u64, GatewayCloseError> {
        self.seq += 1;
        let message = GatewayMessage::dispatch(event_type, self.seq, data);
        self.replay.push(self.seq, message.clone());

        match timeout(SEND_TIMEOUT, self.sender.send(message)).await {
            Ok(Ok(())) => Ok(self.seq),
            _ => Err(GatewayCloseError::Backpressure),
        }
    }

    /// Validates and executes a Resume request. Returns the buffered
    /// events to replay, in order; the caller switches the
    /// session to live mode after sending them.
    pub fn resume(&mut self, token: &str, seq: u64) -> Result<Vec<GatewayMessage>, GatewayCloseError> {
        if token != self.token {
            return Err(GatewayCloseError::AuthenticationFailed);
        }

        if let Some(disconnected_at) = self.disconnected_at {
            if disconnected_at.elapsed() > RESUME_WINDOW {
                return Err(GatewayCloseError::InvalidSequence);
            }
        }

        let valid = match self.replay.first_replayable_seq() {
            Some(first) => seq + 1 >= first,
            None => seq == self.seq,
        };

        if !valid || seq > self.seq {
            return Err(GatewayCloseError::InvalidSequence);
        }

        self.disconnected_at = None;
        Ok(self.replay.replay_after(seq))
    }

    pub fn mark_disconnected(&mut self) {
        self.disconnected_at = Some(Instant::now());
    }

    pub fn is_resumable(&self) -> bool {
        self.disconnected_at
            .is_some_and(|at| at.elapsed() <= RESUME_WINDOW)
    }

    pub fn touch_heartbeat(&mut self) {
        self.last_heartbeat_at = Instant::now();
    }

    pub fn heartbeat_overdue(&self, heartbeat_interval: Duration) -> bool {
        self.last_heartbeat_at.elapsed() > heartbeat_interval * HEARTBEAT_ACK_MULTIPLIER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> (Session, tokio::sync::mpsc::Receiver<GatewayMessage>) {
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let session = Session::new(Ulid::generate(), "tok".to_string(), HashSet::new(), tx);
        (session, rx)
    }

    /// Invariant 3 and scenario S3.
    #[tokio::test]
    async fn sequence_is_contiguous_and_resume_replays_tail() {
        let (mut session, mut rx) = session();
        for i in 1..=10u64 {
            let seq = session.dispatch("test.event", json!({ "i": i })).await.unwrap();
            assert_eq!(seq, i);
            rx.recv().await.unwrap();
        }

        session.mark_disconnected();
        let replayed = session.resume("tok", 7).unwrap();
        let seqs: Vec<u64> = replayed.iter().map(|m| m.sequence.unwrap()).collect();
        assert_eq!(seqs, vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn resume_with_wrong_token_fails_auth() {
        let (mut session, _rx) = session();
        let err = session.resume("wrong", 0).unwrap_err();
        assert_eq!(err, GatewayCloseError::AuthenticationFailed);
    }

    #[tokio::test]
    async fn resume_outside_buffer_window_is_invalid_sequence() {
        let (mut session, mut rx) = session();
        for i in 1..=300u64 {
            session.dispatch("test.event", json!({ "i": i })).await.unwrap();
            rx.recv().await.unwrap();
        }
        // only the last 256 are retained, so seq=1 is no longer replayable
        let err = session.resume("tok", 1).unwrap_err();
        assert_eq!(err, GatewayCloseError::InvalidSequence);
    }

    #[tokio::test]
    async fn caught_up_resume_with_empty_buffer_succeeds() {
        let (mut session, _rx) = session();
        let replayed = session.resume("tok", 0).unwrap();
        assert!(replayed.is_empty());
    }

    #[test]
    fn subscription_matches_user_guild_or_channel() {
        let (session, _rx) = {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            let mut guilds = HashSet::new();
            let guild_id = Ulid::generate();
            guilds.insert(guild_id);
            (Session::new(Ulid::generate(), "t".into(), guilds, tx), rx)
        };

        assert!(session.is_subscribed(Some(session.user_id), None, None));
        assert!(!session.is_subscribed(Some(Ulid::generate()), None, None));
    }
}
