//! Per-order synchronisation for running sagas.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::OrderId;
use tokio::sync::{Mutex, Notify};

/// What every task touching one order shares.
///
/// `lock` serialises the order's journal commits together with the index
/// update that follows them. `wake` rouses the driver task parked while the
/// order waits for a driver.
#[derive(Debug, Default)]
pub struct OrderSlot {
    pub(crate) lock: Mutex<()>,
    pub(crate) wake: Notify,
    driving: AtomicBool,
}

impl OrderSlot {
    /// Marks the slot as having a driver task. Returns false if one is
    /// already running.
    pub(crate) fn claim(&self) -> bool {
        self.driving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn unclaim(&self) {
        self.driving.store(false, Ordering::SeqCst);
    }

    pub fn is_driving(&self) -> bool {
        self.driving.load(Ordering::SeqCst)
    }
}

/// Table of order slots, created on first use and dropped once idle.
#[derive(Debug, Clone, Default)]
pub struct OrderSlots {
    slots: Arc<Mutex<HashMap<OrderId, Arc<OrderSlot>>>>,
}

impl OrderSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for an order, creating it if needed.
    pub async fn slot(&self, order_id: OrderId) -> Arc<OrderSlot> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(order_id).or_default())
    }

    /// The slot for an order with its driver claimed, or `None` when a
    /// driver task already runs on it.
    pub async fn claim(&self, order_id: OrderId) -> Option<Arc<OrderSlot>> {
        let slot = self.slot(order_id).await;
        if slot.claim() {
            Some(slot)
        } else {
            self.release(order_id, slot).await;
            None
        }
    }

    /// Gives a slot back, dropping it from the table when nobody else holds
    /// it and no driver task runs on it.
    pub async fn release(&self, order_id: OrderId, slot: Arc<OrderSlot>) {
        let mut slots = self.slots.lock().await;
        // One reference in the table, one in `slot`.
        if Arc::strong_count(&slot) <= 2 && !slot.is_driving() {
            slots.remove(&order_id);
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_order_shares_slot() {
        let slots = OrderSlots::new();
        let id = OrderId::new();
        let a = slots.slot(id).await;
        let b = slots.slot(id).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(slots.len().await, 1);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let slot = OrderSlot::default();
        assert!(slot.claim());
        assert!(!slot.claim());
        slot.unclaim();
        assert!(slot.claim());
    }

    #[tokio::test]
    async fn test_second_claim_on_order_is_refused() {
        let slots = OrderSlots::new();
        let id = OrderId::new();

        let driving = slots.claim(id).await.unwrap();
        assert!(driving.is_driving());
        assert!(slots.claim(id).await.is_none());
        assert_eq!(slots.len().await, 1);

        driving.unclaim();
        slots.release(id, driving).await;
        assert!(slots.is_empty().await);
        assert!(slots.claim(id).await.is_some());
    }

    #[tokio::test]
    async fn test_release_keeps_shared_or_driving_slots() {
        let slots = OrderSlots::new();
        let id = OrderId::new();

        let first = slots.slot(id).await;
        let second = slots.slot(id).await;
        slots.release(id, first).await;
        assert_eq!(slots.len().await, 1);

        second.claim();
        let third = slots.slot(id).await;
        slots.release(id, third).await;
        assert_eq!(slots.len().await, 1);

        second.unclaim();
        slots.release(id, second).await;
        assert!(slots.is_empty().await);
    }
}
