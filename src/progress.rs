//! Append-only, replayable progress stream.
//!
//! Every run owns one stream. Events carry a monotonically increasing
//! sequence number; a late subscriber receives the full buffered history and
//! then live events, in order. The buffer is bounded by event count, and
//! only heartbeats are ever evicted (oldest first); structural events are
//! never dropped, so the bound is soft once no heartbeats remain.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::draft::{FailureKind, ObligationResult, RewriteRecord};

const DEFAULT_BUFFER_CAPACITY: usize = 1024;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    GenerationStarted {
        activity_id: String,
        slot_count: usize,
    },
    SlotStarted {
        slot_index: usize,
        difficulty: String,
        topics: Vec<String>,
    },
    SlotLlmAttemptStarted {
        slot_index: usize,
        attempt: usize,
    },
    SlotContractValidated {
        slot_index: usize,
        attempt: usize,
    },
    /// Obligation results and applied rewrites for one validated attempt.
    SlotEvidence {
        slot_index: usize,
        attempt: usize,
        obligations: Vec<ObligationResult>,
        rewrites: Vec<RewriteRecord>,
    },
    SlotContractFailed {
        slot_index: usize,
        attempt: usize,
        obligation_id: Option<&'static str>,
        error: String,
    },
    SlotDockerValidationStarted {
        slot_index: usize,
        attempt: usize,
    },
    SlotDockerValidationFailed {
        slot_index: usize,
        attempt: usize,
        kind: FailureKind,
        error: String,
    },
    SlotCompleted {
        slot_index: usize,
        problem_id: String,
    },
    GenerationSoftFallbackApplied {
        slot_index: usize,
        from: String,
        to: String,
    },
    GenerationCompleted {
        activity_id: String,
        problem_count: usize,
    },
    GenerationFailed {
        kind: String,
        error: String,
    },
    Heartbeat,
}

impl ProgressEvent {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, ProgressEvent::Heartbeat)
    }

    /// Slot partition key, when the event belongs to one slot.
    pub fn slot_index(&self) -> Option<usize> {
        match self {
            ProgressEvent::SlotStarted { slot_index, .. }
            | ProgressEvent::SlotLlmAttemptStarted { slot_index, .. }
            | ProgressEvent::SlotContractValidated { slot_index, .. }
            | ProgressEvent::SlotEvidence { slot_index, .. }
            | ProgressEvent::SlotContractFailed { slot_index, .. }
            | ProgressEvent::SlotDockerValidationStarted { slot_index, .. }
            | ProgressEvent::SlotDockerValidationFailed { slot_index, .. }
            | ProgressEvent::SlotCompleted { slot_index, .. }
            | ProgressEvent::GenerationSoftFallbackApplied { slot_index, .. } => Some(*slot_index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

struct StreamState {
    buffer: Vec<SequencedEvent>,
    next_seq: u64,
}

/// One run's event log plus live fan-out.
pub struct ProgressStream {
    state: Mutex<StreamState>,
    tx: broadcast::Sender<SequencedEvent>,
    capacity: usize,
}

impl Default for ProgressStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStream {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            state: Mutex::new(StreamState {
                buffer: Vec::new(),
                next_seq: 0,
            }),
            tx,
            capacity,
        }
    }

    /// Append an event. Returns its sequence number.
    pub fn emit(&self, event: ProgressEvent) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let seq = state.next_seq;
        state.next_seq += 1;

        let sequenced = SequencedEvent { seq, event };
        state.buffer.push(sequenced.clone());

        while state.buffer.len() > self.capacity {
            let Some(oldest_heartbeat) = state
                .buffer
                .iter()
                .position(|e| e.event.is_heartbeat())
            else {
                break;
            };
            state.buffer.remove(oldest_heartbeat);
        }

        // Receivers may be gone; emission is still recorded
        let _ = self.tx.send(sequenced);
        seq
    }

    pub fn heartbeat(&self) -> u64 {
        self.emit(ProgressEvent::Heartbeat)
    }

    /// Replay buffer snapshot plus a live receiver. Taken under the same
    /// lock as emission, so the snapshot and the live feed never overlap or
    /// gap.
    pub fn subscribe(&self) -> (Vec<SequencedEvent>, broadcast::Receiver<SequencedEvent>) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (state.buffer.clone(), self.tx.subscribe())
    }

    /// Snapshot of the buffered history.
    pub fn events(&self) -> Vec<SequencedEvent> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .buffer
            .clone()
    }
}
