// src/broker/memory.rs
//! In-process broker. Lets a whole fleet (sensors + coordinator) run in one
//! process and backs the test-suite.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    Broker, Delivery, DeliveryStream, ExchangeKind, ANNOUNCE_EXCHANGE, DEFAULT_EXCHANGE,
};
use crate::error::TransportError;

#[derive(Debug)]
struct Exchange {
    kind: ExchangeKind,
    bindings: Vec<String>,
}

#[derive(Debug)]
struct Queue {
    tx: mpsc::UnboundedSender<Delivery>,
    /// Taken by the first consumer.
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

#[derive(Debug, Default)]
struct State {
    closed: bool,
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Queue>,
}

#[derive(Debug)]
pub struct MemoryBroker {
    state: Mutex<State>,
    next_queue: AtomicU64,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let mut state = State::default();
        state.exchanges.insert(
            ANNOUNCE_EXCHANGE.to_string(),
            Exchange {
                kind: ExchangeKind::Fanout,
                bindings: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(state),
            next_queue: AtomicU64::new(1),
        }
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.lock().queues.contains_key(name)
    }

    pub fn queue_count(&self) -> usize {
        self.state.lock().queues.len()
    }

    fn open(&self) -> Result<parking_lot::MutexGuard<'_, State>, TransportError> {
        let st = self.state.lock();
        if st.closed {
            return Err(TransportError::Closed);
        }
        Ok(st)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), TransportError> {
        let mut st = self.open()?;
        match st.exchanges.get(name) {
            Some(ex) if ex.kind != kind => Err(TransportError::ExchangeKindMismatch {
                name: name.to_string(),
                existing: ex.kind.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                st.exchanges.insert(
                    name.to_string(),
                    Exchange {
                        kind,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str) -> Result<String, TransportError> {
        let mut st = self.open()?;
        let name = if name.is_empty() {
            format!("amq.gen-{}", self.next_queue.fetch_add(1, Ordering::Relaxed))
        } else {
            name.to_string()
        };
        st.queues.entry(name.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            Queue { tx, rx: Some(rx) }
        });
        Ok(name)
    }

    async fn bind_queue(&self, queue: &str, exchange: &str) -> Result<(), TransportError> {
        let mut st = self.open()?;
        if !st.queues.contains_key(queue) {
            return Err(TransportError::QueueNotFound(queue.to_string()));
        }
        let ex = st
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| TransportError::ExchangeNotFound(exchange.to_string()))?;
        if !ex.bindings.iter().any(|q| q == queue) {
            ex.bindings.push(queue.to_string());
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, TransportError> {
        let mut st = self.open()?;
        let q = st
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;
        q.rx
            .take()
            .ok_or_else(|| TransportError::ConsumerBusy(queue.to_string()))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        let st = self.open()?;
        let delivery = Delivery {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body,
        };

        if exchange == DEFAULT_EXCHANGE {
            match st.queues.get(routing_key) {
                // A consumer that went away is not the publisher's problem.
                Some(q) => {
                    let _ = q.tx.send(delivery);
                }
                None => debug!(queue = routing_key, "unroutable message dropped"),
            }
            return Ok(());
        }

        let ex = st
            .exchanges
            .get(exchange)
            .ok_or_else(|| TransportError::ExchangeNotFound(exchange.to_string()))?;
        match ex.kind {
            ExchangeKind::Fanout => {
                for name in &ex.bindings {
                    if let Some(q) = st.queues.get(name) {
                        let _ = q.tx.send(delivery.clone());
                    }
                }
            }
            ExchangeKind::Direct => {
                if ex.bindings.iter().any(|q| q == routing_key) {
                    if let Some(q) = st.queues.get(routing_key) {
                        let _ = q.tx.send(delivery);
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete_queue(&self, queue: &str) -> Result<(), TransportError> {
        let mut st = self.open()?;
        if st.queues.remove(queue).is_none() {
            return Err(TransportError::QueueNotFound(queue.to_string()));
        }
        for ex in st.exchanges.values_mut() {
            ex.bindings.retain(|q| q != queue);
        }
        Ok(())
    }

    async fn close(&self) {
        let mut st = self.state.lock();
        st.closed = true;
        st.queues.clear();
        st.exchanges.clear();
    }
}
