//! # Consumer Queue
//!
//! A bounded queue of decoded packets with a configurable overflow policy. `tokio::mpsc`
//! can't drop its oldest element on overflow, so the queue is a small `VecDeque` behind a
//! mutex, woken with a `Notify`, instead.

use crate::config::OverflowPolicy;
use crate::registry::Packet;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct Inner {
    items: Mutex<VecDeque<Packet>>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

/// The producer half, held by the receive task.
#[derive(Clone)]
pub struct QueueSender {
    inner: Arc<Inner>,
}

/// The consumer half, held by [`crate::session::Session`].
pub struct QueueReceiver {
    inner: Arc<Inner>,
}

pub fn channel(capacity: usize, policy: OverflowPolicy) -> (QueueSender, QueueReceiver) {
    let inner = Arc::new(Inner {
        items: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        notify: Notify::new(),
        capacity,
        policy,
    });
    (
        QueueSender {
            inner: inner.clone(),
        },
        QueueReceiver { inner },
    )
}

impl QueueSender {
    /// Pushes `packet`, applying the configured overflow policy if the queue is full.
    /// Returns `true` if a packet was dropped (either `packet` itself under `Error`, or the
    /// previous oldest entry under `DropOldest`) so the caller can update telemetry.
    pub fn push(&self, packet: Packet) -> bool {
        let mut items = self.inner.items.lock().unwrap();
        let overflowed = if items.len() >= self.inner.capacity {
            match self.inner.policy {
                OverflowPolicy::DropOldest => {
                    items.pop_front();
                    items.push_back(packet);
                    true
                }
                OverflowPolicy::Error => true,
            }
        } else {
            items.push_back(packet);
            false
        };
        drop(items);
        self.inner.notify.notify_one();
        overflowed
    }

    /// Wakes every blocked `recv` so it can observe a closed flag flipping to `true`.
    pub fn notify_closed(&self) {
        self.inner.notify.notify_waiters();
    }
}

impl QueueReceiver {
    /// Waits for and removes the next packet, or `None` once `close` has been called and the
    /// queue has drained.
    pub async fn recv(&mut self, closed: &std::sync::atomic::AtomicBool) -> Option<Packet> {
        loop {
            {
                let mut items = self.inner.items.lock().unwrap();
                if let Some(packet) = items.pop_front() {
                    return Some(packet);
                }
                if closed.load(std::sync::atomic::Ordering::Acquire) {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }
}
