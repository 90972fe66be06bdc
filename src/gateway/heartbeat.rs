// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The server-side heartbeat watcher.
//!
//! Chorus's `DefaultHeartbeatHandler::heartbeat_task` (`gateway/heartbeat.rs`
//! in the original) is a client sending its own heartbeats and resending
//! on a missed ack. Here the direction inverts: the server never sends a
//! heartbeat, it watches for the client's, and closes the session if
//! none arrives within `2 * heartbeat_interval`.

use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::time::{interval, MissedTickBehavior};

use crate::errors::GatewayCloseError;

/// Sent by the connection task on every received `Op 1 Heartbeat`.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatReceived;

/// Watches for heartbeats on `heartbeats`, checking at `heartbeat_interval`
/// granularity. Returns once the client has gone quiet for
/// `2 * heartbeat_interval`; the caller closes the socket with
/// [`GatewayCloseError::GoingAway`].
pub async fn watch(
    heartbeat_interval: Duration,
    mut heartbeats: Receiver<HeartbeatReceived>,
    mut last_heartbeat_elapsed: impl FnMut() -> Duration,
) -> GatewayCloseError {
    let mut ticker = interval(heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if last_heartbeat_elapsed() > heartbeat_interval * 2 {
                    return GatewayCloseError::GoingAway;
                }
            }
            received = heartbeats.recv() => {
                if received.is_none() {
                    // connection task dropped its sender: socket is gone
                    return GatewayCloseError::GoingAway;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn closes_after_two_missed_intervals() {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let elapsed = Arc::new(AtomicU64::new(0));
        let elapsed_reader = elapsed.clone();

        let watcher = tokio::spawn(watch(
            Duration::from_millis(10),
            rx,
            move || Duration::from_millis(elapsed_reader.load(Ordering::SeqCst)),
        ));

        elapsed.store(25, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(30)).await;

        let result = watcher.await.unwrap();
        assert_eq!(result, GatewayCloseError::GoingAway);
    }
}
