/// Bounded FIFO of pending packets, the single point of flow control.
///
/// Producers (ingress handlers) never wait: `try_enqueue` either
/// accepts the packet or rejects it immediately, and the rejection is
/// what surfaces as backpressure at the ingress. Consumers (dispatch
/// workers) drain in bounded batches and park on a `Notify` when idle,
/// with a periodic tick as the fallback wakeup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Notify;

use logway_protocol::message::LogMessage;

/// One accepted submission, owned by the queue until a worker drains
/// it. Once enqueued, the gateway is committed to attempting delivery
/// of every message in it.
#[derive(Debug)]
pub struct QueuedPacket {
    pub packet_id: String,
    pub agent_id: Option<String>,
    pub messages: Vec<LogMessage>,
    pub enqueued_at: Instant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("queue is at capacity")]
    QueueFull,
    #[error("gateway is shutting down")]
    Closed,
}

pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    /// Instantaneous depth, readable without taking the lock.
    depth: AtomicUsize,
}

struct QueueInner {
    packets: VecDeque<QueuedPacket>,
    closed: bool,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                packets: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            depth: AtomicUsize::new(0),
        }
    }

    /// Accept a packet or reject it without blocking.
    pub fn try_enqueue(&self, packet: QueuedPacket) -> Result<(), EnqueueError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(EnqueueError::Closed);
            }
            if inner.packets.len() >= self.capacity {
                return Err(EnqueueError::QueueFull);
            }
            inner.packets.push_back(packet);
            self.depth.store(inner.packets.len(), Ordering::Relaxed);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Remove up to `max` packets in FIFO order. Never blocks; returns
    /// an empty vec when the queue is empty.
    pub fn drain_batch(&self, max: usize) -> Vec<QueuedPacket> {
        let mut inner = self.inner.lock().unwrap();
        let n = max.min(inner.packets.len());
        let batch: Vec<QueuedPacket> = inner.packets.drain(..n).collect();
        self.depth.store(inner.packets.len(), Ordering::Relaxed);
        batch
    }

    /// Take everything still queued. Used at shutdown to count
    /// undelivered packets as dropped.
    pub fn drain_remaining(&self) -> Vec<QueuedPacket> {
        let mut inner = self.inner.lock().unwrap();
        let remaining: Vec<QueuedPacket> = inner.packets.drain(..).collect();
        self.depth.store(0, Ordering::Relaxed);
        remaining
    }

    /// Stop accepting new packets. Idempotent. Queued packets remain
    /// drainable; waiting workers are woken for the final sweep.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Park until a producer signals. Signals may be coalesced, so
    /// callers pair this with a periodic tick.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
