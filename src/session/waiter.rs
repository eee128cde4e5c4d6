//! # Pending-Echo Table
//!
//! Couples "the next packet with header X" to a waiting caller, per §9's design note. A
//! single logical wait may cover several expected headers (an ack family plus a possible
//! `SensorError`); all of them are registered against the same slot so whichever arrives
//! first wins and the others become inert.

use crate::error::ImuError;
use crate::registry::Packet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<Packet, ImuError>>>>>;

/// What happened when a received packet's header was checked against the table.
pub enum CompleteOutcome {
    /// No waiter was registered for this header; the caller should route it to the consumer
    /// queue.
    NoWaiter,
    /// A waiter was registered and successfully notified.
    Delivered,
    /// A waiter was registered for this header, but the caller had already dropped its
    /// receiver (cancelled). The response must not be lost: reroute it to the consumer queue.
    ReceiverDropped(Result<Packet, ImuError>),
}

/// Maps expected-echo headers to pending callers. At most one in-flight command per expected
/// header (a second registration for the same header simply replaces the slot, mirroring the
/// state invariant that a caller wouldn't issue two concurrent commands sharing an echo).
#[derive(Default)]
pub struct WaiterTable {
    inner: Mutex<HashMap<u16, Slot>>,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter under every header in `headers`, returning the receiver the
    /// caller should await.
    pub fn register(&self, headers: &[u16]) -> oneshot::Receiver<Result<Packet, ImuError>> {
        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));
        let mut table = self.inner.lock().unwrap();
        for header in headers {
            table.insert(*header, slot.clone());
        }
        rx
    }

    /// Checks whether `header` has a registered waiter and, if so, completes it with
    /// `result`.
    pub fn try_complete(&self, header: u16, result: Result<Packet, ImuError>) -> CompleteOutcome {
        let slot = {
            let mut table = self.inner.lock().unwrap();
            table.remove(&header)
        };
        let Some(slot) = slot else {
            return CompleteOutcome::NoWaiter;
        };
        let mut guard = slot.lock().unwrap();
        match guard.take() {
            Some(sender) => match sender.send(result) {
                Ok(()) => CompleteOutcome::Delivered,
                Err(unsent) => CompleteOutcome::ReceiverDropped(unsent),
            },
            // Another header sharing this slot already delivered or was dropped.
            None => CompleteOutcome::NoWaiter,
        }
    }

    /// Fails every still-pending waiter with [`ImuError::Disconnected`], called once when the
    /// receive task observes the transport close.
    pub fn fail_all(&self) {
        let mut table = self.inner.lock().unwrap();
        for (_, slot) in table.drain() {
            if let Some(sender) = slot.lock().unwrap().take() {
                let _ = sender.send(Err(ImuError::Disconnected));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Packet;

    #[tokio::test]
    async fn delivers_to_whichever_expected_header_arrives_first() {
        let table = WaiterTable::new();
        let rx = table.register(&[0x0001, 0x0002]);

        match table.try_complete(0x0002, Ok(Packet::AckSleep)) {
            CompleteOutcome::Delivered => {}
            _ => panic!("expected delivery"),
        }
        assert!(matches!(rx.await, Ok(Ok(Packet::AckSleep))));
    }

    #[tokio::test]
    async fn second_header_after_first_delivery_is_a_no_op() {
        let table = WaiterTable::new();
        let _rx = table.register(&[0x0001, 0x0002]);
        table.try_complete(0x0001, Ok(Packet::AckSleep));
        assert!(matches!(
            table.try_complete(0x0002, Ok(Packet::AckSleep)),
            CompleteOutcome::NoWaiter
        ));
    }

    #[tokio::test]
    async fn dropped_receiver_reroutes_the_response_instead_of_losing_it() {
        let table = WaiterTable::new();
        let rx = table.register(&[0x0003]);
        drop(rx);
        match table.try_complete(0x0003, Ok(Packet::AckSleep)) {
            CompleteOutcome::ReceiverDropped(Ok(Packet::AckSleep)) => {}
            _ => panic!("expected a rerouted response"),
        }
    }

    #[tokio::test]
    async fn fail_all_delivers_disconnected_to_every_pending_waiter() {
        let table = WaiterTable::new();
        let rx = table.register(&[0x0001]);
        table.fail_all();
        assert!(matches!(rx.await, Ok(Err(ImuError::Disconnected))));
    }
}
