//! EventRecorder - Transition Event Buffering
//!
//! ## Responsibilities
//!
//! - Buffer (correlation id, event kind) pairs as transitions happen
//! - Flush the whole batch once per cycle through an `EventSink`
//! - Keep a bounded in-memory event log for the status API
//!
//! Flushing is all-or-nothing per batch: a sink failure loses that
//! cycle's events (logged, no retry, no dead-letter).

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Kind of a recorded transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Down,
    Recovered,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Down => "down",
            EventKind::Recovered => "recovered",
        }
    }
}

/// One buffered transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub correlation_id: Uuid,
    pub kind: EventKind,
    pub recorded_at: DateTime<Utc>,
}

/// Boundary for event batch persistence
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist a batch atomically; an error means none were stored
    async fn persist(&self, events: &[EventRecord]) -> Result<()>;
}

/// EventRecorder instance
pub struct EventRecorder {
    pending: Mutex<Vec<EventRecord>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue an event for the next flush. Cameras without a correlation
    /// id are silently skipped; there is nothing to record them against.
    pub async fn enqueue(&self, correlation_id: Option<Uuid>, kind: EventKind) {
        let Some(correlation_id) = correlation_id else {
            return;
        };
        let mut pending = self.pending.lock().await;
        pending.push(EventRecord {
            correlation_id,
            kind,
            recorded_at: Utc::now(),
        });
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drain the buffer and hand the batch to the sink. The buffer is
    /// cleared whether or not persistence succeeds.
    pub async fn flush(&self, sink: &dyn EventSink) {
        let batch: Vec<EventRecord> = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return;
        }

        match sink.persist(&batch).await {
            Ok(()) => {
                tracing::info!(count = batch.len(), "Flushed transition events");
            }
            Err(e) => {
                tracing::error!(
                    count = batch.len(),
                    error = %e,
                    "Event flush failed, batch dropped"
                );
            }
        }
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Event with its log-assigned id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: u64,
    pub correlation_id: Uuid,
    pub kind: EventKind,
    pub recorded_at: DateTime<Utc>,
}

struct EventRing {
    events: VecDeque<StoredEvent>,
    capacity: usize,
    next_id: u64,
}

/// Ring-buffer sink retaining recent events for the status API
pub struct EventLogStore {
    buffer: RwLock<EventRing>,
}

impl EventLogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(EventRing {
                events: VecDeque::with_capacity(capacity),
                capacity,
                next_id: 1,
            }),
        }
    }

    /// Latest events, newest first
    pub async fn latest(&self, count: usize) -> Vec<StoredEvent> {
        let buffer = self.buffer.read().await;
        buffer.events.iter().rev().take(count).cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.buffer.read().await.events.len()
    }
}

impl Default for EventLogStore {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl EventSink for EventLogStore {
    async fn persist(&self, events: &[EventRecord]) -> Result<()> {
        if events.is_empty() {
            return Err(Error::EventSink("empty batch".to_string()));
        }
        let mut buffer = self.buffer.write().await;
        for event in events {
            let event_id = buffer.next_id;
            buffer.next_id += 1;
            if buffer.events.len() >= buffer.capacity {
                buffer.events.pop_front();
            }
            buffer.events.push_back(StoredEvent {
                event_id,
                correlation_id: event.correlation_id,
                kind: event.kind,
                recorded_at: event.recorded_at,
            });
        }
        Ok(())
    }
}
