//! The dispatcher's dashboard: waiting orders, their live count, and driver
//! assignment.

use std::sync::Arc;

use common::OrderId;
use domain::{PlaceOrderResult, Roster};
use journal::Journal;
use projections::{CountSubscription, IndexCount, LiveCountFeed, OrderFilter, OrderIndexEntry};

use crate::Coordinator;
use crate::error::ApiError;

/// Read and write side of the dashboard.
pub struct Dashboard<J: Journal> {
    coordinator: Coordinator<J>,
    feed: LiveCountFeed<IndexCount>,
    roster: Arc<Roster>,
}

impl<J> Dashboard<J>
where
    J: Journal + Clone + 'static,
{
    pub fn new(coordinator: Coordinator<J>, feed: LiveCountFeed<IndexCount>, roster: Arc<Roster>) -> Self {
        Self {
            coordinator,
            feed,
            roster,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn feed(&self) -> &LiveCountFeed<IndexCount> {
        &self.feed
    }

    pub async fn count(&self, unassigned_only: bool) -> u64 {
        self.coordinator.index().count(filter(unassigned_only)).await
    }

    /// The total matching count and the first `page_size` entries, oldest first.
    pub async fn list(&self, unassigned_only: bool, page_size: usize) -> (u64, Vec<OrderIndexEntry>) {
        self.coordinator
            .index()
            .page(filter(unassigned_only), page_size)
            .await
    }

    /// Pushes the number of orders waiting for a driver whenever it changes.
    pub fn subscribe_count(&self) -> CountSubscription {
        self.feed.subscribe()
    }

    /// Assigns a roster driver, looked up by id or name, to a waiting order.
    #[tracing::instrument(skip(self, note), fields(order_id = %order_id))]
    pub async fn assign(
        &self,
        order_id: OrderId,
        driver: &str,
        note: &str,
    ) -> Result<PlaceOrderResult, ApiError> {
        let assignment = self
            .roster
            .find(driver)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown driver: {driver}")))?
            .assign(note);

        Ok(self.coordinator.assign_driver(order_id, assignment).await?)
    }
}

fn filter(unassigned_only: bool) -> OrderFilter {
    if unassigned_only {
        OrderFilter::unassigned()
    } else {
        OrderFilter::all()
    }
}
