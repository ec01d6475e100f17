// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The mutation event stream (§3 "Mutation event", §4.4 "Mutation
//! emission"). Every write emits a [`MutationEvent`] onto a bounded channel;
//! on overflow the server increments a dropped-events counter rather than
//! blocking. A parallel ring buffer of the most recent 100 events backs the
//! `get_mutations(since_ms)` polling query, since consumers must tolerate
//! channel drops and reconcile via timestamps anyway (§9).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use chrono::Utc;
use wk_core::MutationEvent;

const RING_BUFFER_SIZE: usize = 100;

/// Bounded fan-out of mutation events: a push channel for future streaming
/// consumers, plus the ring buffer that `get_mutations` reads.
pub struct MutationBus {
    sender: SyncSender<MutationEvent>,
    _receiver: Mutex<Receiver<MutationEvent>>,
    ring: Mutex<VecDeque<(i64, MutationEvent)>>,
    dropped: AtomicU64,
}

impl MutationBus {
    /// `capacity` is the bounded channel's buffer size
    /// (`BEADS_MUTATION_BUFFER`, default 512).
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity.max(1));
        MutationBus {
            sender,
            _receiver: Mutex::new(receiver),
            ring: Mutex::new(VecDeque::with_capacity(RING_BUFFER_SIZE)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Records `event`: always appended to the ring buffer (evicting the
    /// oldest entry past [`RING_BUFFER_SIZE`]), and best-effort pushed onto
    /// the bounded channel. A full channel increments the dropped counter
    /// rather than blocking the caller (a request-handling thread).
    pub fn emit(&self, event: MutationEvent) {
        let now_ms = event.timestamp.timestamp_millis();
        {
            let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
            if ring.len() >= RING_BUFFER_SIZE {
                ring.pop_front();
            }
            ring.push_back((now_ms, event.clone()));
        }
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Every retained event with `timestamp_millis() >= since_ms`.
    pub fn since(&self, since_ms: i64) -> Vec<MutationEvent> {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        ring.iter()
            .filter(|(ts, _)| *ts >= since_ms)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Current time in milliseconds since the epoch, for `get_mutations`
/// callers that want "now" as their starting watermark.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "mutation_tests.rs"]
mod tests;
