// src/aggregator.rs
//! In-process publish/subscribe hub keyed by topic name.
//!
//! Delivery is synchronous: `publish` runs every handler registered for the
//! topic on the caller's task, in registration order. A slow handler stalls
//! the publisher; consumers that need isolation should use
//! [`EventAggregator::subscribe_channel`] and drain the receiver on their own task.

use metrics::counter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::metrics::ensure_metrics_described;

/// One published event as seen by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    pub topic: String,
    pub payload: T,
}

pub type Handler<T> = Arc<dyn Fn(&Event<T>) + Send + Sync>;

pub struct EventAggregator<T> {
    handlers: RwLock<HashMap<String, Vec<Handler<T>>>>,
}

impl<T> Default for EventAggregator<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> EventAggregator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the topic's handler list.
    pub fn register<F>(&self, topic: impl Into<String>, handler: F)
    where
        F: Fn(&Event<T>) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(topic.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver `payload` to every handler currently registered for `topic`.
    /// Returns how many handlers ran; zero means the event was dropped.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        // Snapshot so handlers may register without deadlocking on the lock.
        let snapshot: Vec<Handler<T>> = match self.handlers.read().get(topic) {
            Some(hs) => hs.clone(),
            None => Vec::new(),
        };
        if snapshot.is_empty() {
            ensure_metrics_described();
            counter!("fleet_events_unrouted_total").increment(1);
            return 0;
        }

        let event = Event {
            topic: topic.to_string(),
            payload,
        };
        for h in &snapshot {
            h(&event);
        }
        snapshot.len()
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.read().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one handler, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut out: Vec<String> = self.handlers.read().keys().cloned().collect();
        out.sort();
        out
    }
}

impl<T: Clone + Send + 'static> EventAggregator<T> {
    /// Register a handler that forwards every event on `topic` into a channel.
    pub fn subscribe_channel(&self, topic: impl Into<String>) -> mpsc::UnboundedReceiver<Event<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(topic, move |ev: &Event<T>| {
            let _ = tx.send(ev.clone());
        });
        rx
    }
}
