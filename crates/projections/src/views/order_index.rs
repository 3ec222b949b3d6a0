//! Order index: published orders, queryable and annotatable by the dashboard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, RunId};
use domain::{Aggregate, Order, OrderAttributes, OrderEvent};
use journal::JournalEntry;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::feed::CountSource;
use crate::projection::{Projection, ProjectionPosition};
use crate::{ProjectionError, Result};

/// One published order as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIndexEntry {
    pub order_id: OrderId,
    pub run_id: RunId,
    pub customer_name: String,
    pub customer_address: String,
    pub pizza_number: i32,
    pub pizza_name: String,
    pub driver_assigned: bool,
    pub assigned_driver: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl OrderIndexEntry {
    /// Builds an unassigned entry from the attributes an order was published with.
    pub fn published(
        order_id: OrderId,
        attributes: &OrderAttributes,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            run_id: attributes.run_id,
            customer_name: attributes.customer_name.clone(),
            customer_address: attributes.customer_address.clone(),
            pizza_number: attributes.pizza_number,
            pizza_name: attributes.pizza_name.clone(),
            driver_assigned: false,
            assigned_driver: None,
            published_at,
        }
    }
}

/// Which entries a query covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub unassigned_only: bool,
}

impl OrderFilter {
    /// Orders still waiting for a driver. This is what the dashboard shows.
    pub fn unassigned() -> Self {
        Self {
            unassigned_only: true,
        }
    }

    pub fn all() -> Self {
        Self {
            unassigned_only: false,
        }
    }

    pub fn matches(&self, entry: &OrderIndexEntry) -> bool {
        !self.unassigned_only || !entry.driver_assigned
    }
}

/// Shared store of published orders.
///
/// Every read and write goes through one lock, so a write is visible to the
/// next read from any task. Cheap to clone; clones share the same store.
#[derive(Clone, Default)]
pub struct OrderIndex {
    entries: Arc<RwLock<HashMap<OrderId, OrderIndexEntry>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or overwrites the entry for its order.
    pub async fn publish(&self, entry: OrderIndexEntry) {
        let order_id = entry.order_id;
        self.entries.write().await.insert(order_id, entry);
        metrics::counter!("order_index_published_total").increment(1);
        tracing::debug!(order_id = %order_id, "order published to index");
    }

    /// Flags an entry as assigned and records the driver label.
    pub async fn mark_assigned(
        &self,
        order_id: OrderId,
        driver_label: impl Into<String>,
    ) -> Result<OrderIndexEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&order_id)
            .ok_or(ProjectionError::OrderNotFound(order_id))?;
        if entry.driver_assigned {
            return Err(ProjectionError::AlreadyAssigned(order_id));
        }
        entry.driver_assigned = true;
        entry.assigned_driver = Some(driver_label.into());
        Ok(entry.clone())
    }

    /// Drops an entry, returning it if it was present.
    pub async fn remove(&self, order_id: OrderId) -> Option<OrderIndexEntry> {
        self.entries.write().await.remove(&order_id)
    }

    pub async fn get(&self, order_id: OrderId) -> Option<OrderIndexEntry> {
        self.entries.read().await.get(&order_id).cloned()
    }

    pub async fn count(&self, filter: OrderFilter) -> u64 {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| filter.matches(e))
            .count() as u64
    }

    /// Matching entries, oldest first, at most `page_size` of them.
    pub async fn list(&self, filter: OrderFilter, page_size: usize) -> Vec<OrderIndexEntry> {
        let entries = self.entries.read().await;
        select(&entries, filter, page_size)
    }

    /// The total match count and the first page, read under one lock so the
    /// two agree.
    pub async fn page(&self, filter: OrderFilter, page_size: usize) -> (u64, Vec<OrderIndexEntry>) {
        let entries = self.entries.read().await;
        let total = entries.values().filter(|e| filter.matches(e)).count() as u64;
        (total, select(&entries, filter, page_size))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// A count source for [`crate::LiveCountFeed`] over this index.
    pub fn counter(&self, filter: OrderFilter) -> IndexCount {
        IndexCount {
            index: self.clone(),
            filter,
        }
    }
}

fn select(
    entries: &HashMap<OrderId, OrderIndexEntry>,
    filter: OrderFilter,
    page_size: usize,
) -> Vec<OrderIndexEntry> {
    let mut matching: Vec<_> = entries.values().filter(|e| filter.matches(e)).collect();
    matching.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
    matching.into_iter().take(page_size).cloned().collect()
}

#[async_trait]
impl Projection for OrderIndex {
    fn name(&self) -> &'static str {
        "OrderIndex"
    }

    async fn handle(&self, entry: &JournalEntry) -> Result<()> {
        if entry.stream_type == Order::stream_type() {
            let event: OrderEvent = serde_json::from_value(entry.payload.clone())?;
            let order_id = entry.stream_id;

            match event {
                OrderEvent::OrderPublished(data) => {
                    let published =
                        OrderIndexEntry::published(order_id, &data.attributes, data.published_at);
                    self.entries.write().await.insert(order_id, published);
                }
                OrderEvent::DriverAssigned(data) => {
                    if let Some(indexed) = self.entries.write().await.get_mut(&order_id) {
                        indexed.driver_assigned = true;
                        indexed.assigned_driver = Some(data.assignment.label);
                    }
                }
                OrderEvent::OrderCancelled(_) => {
                    self.entries.write().await.remove(&order_id);
                }
                _ => {}
            }
        }

        self.position.write().await.record(entry);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.position.read().await.clone()
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().await.clear();
        *self.position.write().await = ProjectionPosition::new();
        Ok(())
    }
}

/// Counts the index entries matching a filter.
#[derive(Clone)]
pub struct IndexCount {
    index: OrderIndex,
    filter: OrderFilter,
}

#[async_trait]
impl CountSource for IndexCount {
    async fn current_count(&self) -> Result<u64> {
        Ok(self.index.count(self.filter).await)
    }
}
