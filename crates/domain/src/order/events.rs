//! Order saga events, one per journaled transition.

use chrono::{DateTime, Utc};
use common::{OrderId, RunId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::MenuItem;
use crate::customer::Customer;
use crate::driver::DriverAssignment;

use super::OrderRequest;

/// Events that can occur on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A customer asked for a pizza.
    OrderRequested(OrderRequestedData),

    /// The pizza was found on the menu.
    PizzaVerified(PizzaVerifiedData),

    /// The customer was found in the directory.
    CustomerVerified(CustomerVerifiedData),

    /// The order became visible to the dashboard.
    OrderPublished(OrderPublishedData),

    /// A driver accepted the order.
    DriverAssigned(DriverAssignedData),

    /// The order finished successfully.
    OrderCompleted(OrderCompletedData),

    /// A business rule turned the order down.
    OrderRejected(OrderRejectedData),

    /// A remote step failed for good.
    OrderFailed(OrderFailedData),

    /// An operator cancelled the order.
    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderRequested(_) => "OrderRequested",
            OrderEvent::PizzaVerified(_) => "PizzaVerified",
            OrderEvent::CustomerVerified(_) => "CustomerVerified",
            OrderEvent::OrderPublished(_) => "OrderPublished",
            OrderEvent::DriverAssigned(_) => "DriverAssigned",
            OrderEvent::OrderCompleted(_) => "OrderCompleted",
            OrderEvent::OrderRejected(_) => "OrderRejected",
            OrderEvent::OrderFailed(_) => "OrderFailed",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

/// Data for OrderRequested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequestedData {
    pub order_id: OrderId,

    /// Identifies this execution of the saga.
    pub run_id: RunId,

    pub request: OrderRequest,
    pub requested_at: DateTime<Utc>,
}

/// Data for PizzaVerified event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PizzaVerifiedData {
    pub item: MenuItem,

    /// Remote attempts the lookup took.
    pub attempts: u32,
}

/// Data for CustomerVerified event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerVerifiedData {
    pub customer: Customer,
    pub attempts: u32,
}

/// Searchable attributes attached to a published order.
///
/// This is everything the dashboard needs to list the order without
/// replaying its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAttributes {
    pub run_id: RunId,
    pub customer_name: String,
    pub customer_address: String,
    pub pizza_number: i32,
    pub pizza_name: String,
}

/// Data for OrderPublished event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPublishedData {
    pub attributes: OrderAttributes,
    pub published_at: DateTime<Utc>,
}

/// Data for DriverAssigned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignedData {
    pub assignment: DriverAssignment,
    pub assigned_at: DateTime<Utc>,
}

/// Data for OrderCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedData {
    /// Confirmation returned to the customer.
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

/// Data for OrderRejected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectedData {
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Data for OrderFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedData {
    /// The step that gave up.
    pub step: String,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_requested(order_id: OrderId, run_id: RunId, request: OrderRequest) -> Self {
        OrderEvent::OrderRequested(OrderRequestedData {
            order_id,
            run_id,
            request,
            requested_at: Utc::now(),
        })
    }

    pub fn pizza_verified(item: MenuItem, attempts: u32) -> Self {
        OrderEvent::PizzaVerified(PizzaVerifiedData { item, attempts })
    }

    pub fn customer_verified(customer: Customer, attempts: u32) -> Self {
        OrderEvent::CustomerVerified(CustomerVerifiedData { customer, attempts })
    }

    pub fn order_published(attributes: OrderAttributes) -> Self {
        OrderEvent::OrderPublished(OrderPublishedData {
            attributes,
            published_at: Utc::now(),
        })
    }

    pub fn driver_assigned(assignment: DriverAssignment) -> Self {
        OrderEvent::DriverAssigned(DriverAssignedData {
            assignment,
            assigned_at: Utc::now(),
        })
    }

    pub fn order_completed(message: impl Into<String>) -> Self {
        OrderEvent::OrderCompleted(OrderCompletedData {
            message: message.into(),
            completed_at: Utc::now(),
        })
    }

    pub fn order_rejected(reason: impl Into<String>) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }

    pub fn order_failed(step: impl Into<String>, attempts: u32, error: impl Into<String>) -> Self {
        OrderEvent::OrderFailed(OrderFailedData {
            step: step.into(),
            attempts,
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(reason: impl Into<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }
}
