//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, RunId};
use journal::Sequence;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::MenuItem;
use crate::customer::Customer;
use crate::driver::DriverAssignment;

use super::{OrderAttributes, OrderError, OrderEvent, OrderRequest, OrderState, PlaceOrderResult};

/// Why and where a remote step gave up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub step: String,
    pub attempts: u32,
    pub error: String,
}

/// Order aggregate root.
///
/// One order is one saga run: it is requested, verified against the menu
/// and the customer directory, published for the dashboard, and resolved
/// when a driver is assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,
    run_id: Option<RunId>,

    #[serde(default)]
    sequence: Sequence,

    request: OrderRequest,
    state: OrderState,
    item: Option<MenuItem>,
    customer: Option<Customer>,
    attributes: Option<OrderAttributes>,
    driver_assigned: bool,
    assignment: Option<DriverAssignment>,

    /// Confirmation on success, reason on rejection.
    outcome_message: Option<String>,
    failure: Option<FailureRecord>,
    cancel_reason: Option<String>,

    requested_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn stream_type() -> &'static str {
        "PlaceOrder"
    }

    fn id(&self) -> Option<OrderId> {
        self.id
    }

    fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderRequested(data) => {
                self.id = Some(data.order_id);
                self.run_id = Some(data.run_id);
                self.request = data.request;
                self.state = OrderState::Created;
                self.requested_at = Some(data.requested_at);
                self.updated_at = Some(data.requested_at);
            }
            OrderEvent::PizzaVerified(data) => {
                self.item = Some(data.item);
                self.state = OrderState::MenuVerified;
            }
            OrderEvent::CustomerVerified(data) => {
                self.customer = Some(data.customer);
                self.state = OrderState::CustomerVerified;
            }
            OrderEvent::OrderPublished(data) => {
                self.attributes = Some(data.attributes);
                self.state = OrderState::AwaitingDriver;
                self.published_at = Some(data.published_at);
                self.updated_at = Some(data.published_at);
            }
            OrderEvent::DriverAssigned(data) => {
                self.driver_assigned = true;
                self.assignment = Some(data.assignment);
                self.updated_at = Some(data.assigned_at);
            }
            OrderEvent::OrderCompleted(data) => {
                self.outcome_message = Some(data.message);
                self.state = OrderState::Succeeded;
                self.updated_at = Some(data.completed_at);
            }
            OrderEvent::OrderRejected(data) => {
                self.outcome_message = Some(data.reason);
                self.state = OrderState::Rejected;
                self.updated_at = Some(data.rejected_at);
            }
            OrderEvent::OrderFailed(data) => {
                self.failure = Some(FailureRecord {
                    step: data.step,
                    attempts: data.attempts,
                    error: data.error,
                });
                self.state = OrderState::Failed;
                self.updated_at = Some(data.failed_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.cancel_reason = Some(data.reason);
                self.state = OrderState::Cancelled;
                self.updated_at = Some(data.cancelled_at);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    /// The verified menu item, once the menu step has passed.
    pub fn item(&self) -> Option<&MenuItem> {
        self.item.as_ref()
    }

    /// The verified customer, once the directory step has passed.
    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn attributes(&self) -> Option<&OrderAttributes> {
        self.attributes.as_ref()
    }

    pub fn driver_assigned(&self) -> bool {
        self.driver_assigned
    }

    pub fn assignment(&self) -> Option<&DriverAssignment> {
        self.assignment.as_ref()
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The business outcome, once the order succeeded or was rejected.
    ///
    /// Failed and cancelled orders have no business outcome.
    pub fn result(&self) -> Option<PlaceOrderResult> {
        let message = self.outcome_message.clone()?;
        match self.state {
            OrderState::Succeeded => Some(PlaceOrderResult::succeeded(message)),
            OrderState::Rejected => Some(PlaceOrderResult::rejected(message)),
            _ => None,
        }
    }
}

// Command methods (return events)
impl Order {
    /// Records the customer's request.
    pub fn place(
        &self,
        order_id: OrderId,
        run_id: RunId,
        request: OrderRequest,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyRequested);
        }

        Ok(vec![OrderEvent::order_requested(order_id, run_id, request)])
    }

    /// Records the menu item found for the requested pizza.
    pub fn verify_pizza(&self, item: MenuItem, attempts: u32) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_verify_pizza(), "verify pizza")?;
        Ok(vec![OrderEvent::pizza_verified(item, attempts)])
    }

    /// Records the customer found in the directory.
    pub fn verify_customer(
        &self,
        customer: Customer,
        attempts: u32,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_verify_customer(), "verify customer")?;
        if !customer.is_known() {
            return Err(OrderError::UnknownCustomer);
        }
        Ok(vec![OrderEvent::customer_verified(customer, attempts)])
    }

    /// Turns the order down for a business reason.
    pub fn reject(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_reject(), "reject")?;
        Ok(vec![OrderEvent::order_rejected(reason)])
    }

    /// Publishes the verified order for the dashboard.
    pub fn publish(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_publish(), "publish")?;
        let run_id = self.run_id.ok_or(OrderError::MissingDetails("run id"))?;
        let item = self.item.as_ref().ok_or(OrderError::MissingDetails("menu item"))?;
        let customer = self
            .customer
            .as_ref()
            .ok_or(OrderError::MissingDetails("customer"))?;

        Ok(vec![OrderEvent::order_published(OrderAttributes {
            run_id,
            customer_name: customer.name.clone(),
            customer_address: customer.address.clone(),
            pizza_number: item.number,
            pizza_name: item.name.clone(),
        })])
    }

    /// Resolves an awaiting order with a driver.
    ///
    /// Emits the assignment and the completion together so the order never
    /// rests between the two.
    pub fn assign_driver(
        &self,
        assignment: DriverAssignment,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.driver_assigned {
            return Err(OrderError::AlreadyAssigned);
        }
        self.require(self.state.can_assign_driver(), "assign driver")?;

        let item = self.item.as_ref().ok_or(OrderError::MissingDetails("menu item"))?;
        let customer = self
            .customer
            .as_ref()
            .ok_or(OrderError::MissingDetails("customer"))?;
        let message = confirmation_message(item, customer, &assignment);

        Ok(vec![
            OrderEvent::driver_assigned(assignment),
            OrderEvent::order_completed(message),
        ])
    }

    /// Records that a remote step gave up.
    pub fn fail(
        &self,
        step: impl Into<String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_fail(), "fail")?;
        Ok(vec![OrderEvent::order_failed(step, attempts, error)])
    }

    /// Cancels an order that has not finished yet.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.require(self.state.can_cancel(), "cancel")?;
        Ok(vec![OrderEvent::order_cancelled(reason)])
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action,
            })
        }
    }
}

fn confirmation_message(
    item: &MenuItem,
    customer: &Customer,
    assignment: &DriverAssignment,
) -> String {
    let mut message = format!(
        "Your {} is on its way to {}, estimated delivery in {}. Driver: {}.",
        item.name,
        customer.address,
        customer.delivery_label(),
        assignment.label
    );
    if !assignment.note.is_empty() {
        message.push_str(" Note: ");
        message.push_str(&assignment.note);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::customer::Directory;
    use crate::driver::Roster;

    fn requested(name: &str, pizza: i32) -> Order {
        let mut order = Order::default();
        let events = order
            .place(OrderId::new(), RunId::new(), OrderRequest::new(name, pizza))
            .unwrap();
        order.apply_events(events);
        order
    }

    fn awaiting_driver() -> Order {
        let mut order = requested("Peter", 1);
        let item = Catalog::standard().lookup(1).unwrap().clone();
        order.apply_events(order.verify_pizza(item, 1).unwrap());
        let customer = Directory::standard().lookup("Peter");
        order.apply_events(order.verify_customer(customer, 1).unwrap());
        order.apply_events(order.publish().unwrap());
        order
    }

    fn tommy(note: &str) -> DriverAssignment {
        Roster::standard().find("tommy").unwrap().assign(note)
    }

    #[test]
    fn test_place_order() {
        let order = requested("Peter", 1);
        assert!(order.id().is_some());
        assert!(order.run_id().is_some());
        assert_eq!(order.state(), OrderState::Created);
        assert_eq!(order.request().pizza_number, 1);
    }

    #[test]
    fn test_place_twice_fails() {
        let order = requested("Peter", 1);
        let result = order.place(OrderId::new(), RunId::new(), OrderRequest::new("Peter", 2));
        assert_eq!(result.unwrap_err(), OrderError::AlreadyRequested);
    }

    #[test]
    fn test_happy_path_to_awaiting_driver() {
        let order = awaiting_driver();
        assert_eq!(order.state(), OrderState::AwaitingDriver);
        assert!(!order.driver_assigned());
        assert!(order.published_at().is_some());

        let attributes = order.attributes().unwrap();
        assert_eq!(attributes.customer_name, "Peter Hellberg");
        assert_eq!(attributes.customer_address, "Mosstenabacken 1, 12432 Bandhagen");
        assert_eq!(attributes.pizza_name, "Kebab Pizza");
        assert_eq!(Some(attributes.run_id), order.run_id());
    }

    #[test]
    fn test_assign_driver_succeeds_with_message() {
        let mut order = awaiting_driver();
        let events = order.assign_driver(tommy("")).unwrap();
        assert_eq!(events.len(), 2);
        order.apply_events(events);

        assert_eq!(order.state(), OrderState::Succeeded);
        assert!(order.driver_assigned());
        let result = order.result().unwrap();
        assert!(result.success);
        assert_eq!(
            result.message,
            "Your Kebab Pizza is on its way to Mosstenabacken 1, 12432 Bandhagen, \
             estimated delivery in 5m. Driver: 🧒 Tommy Brown."
        );
    }

    #[test]
    fn test_assignment_note_is_included() {
        let mut order = awaiting_driver();
        order.apply_events(order.assign_driver(tommy("extra napkins")).unwrap());
        assert!(order.result().unwrap().message.ends_with("Note: extra napkins"));
    }

    #[test]
    fn test_second_assignment_fails() {
        let mut order = awaiting_driver();
        order.apply_events(order.assign_driver(tommy("")).unwrap());

        let result = order.assign_driver(tommy("again"));
        assert_eq!(result.unwrap_err(), OrderError::AlreadyAssigned);
        assert_eq!(order.assignment().unwrap().note, "");
    }

    #[test]
    fn test_assign_before_publish_fails() {
        let order = requested("Peter", 1);
        let result = order.assign_driver(tommy(""));
        assert!(matches!(
            result,
            Err(OrderError::InvalidStateTransition {
                current_state: OrderState::Created,
                ..
            })
        ));
    }

    #[test]
    fn test_reject_unknown_pizza() {
        let mut order = requested("Peter", 42);
        order.apply_events(order.reject("You requested pizza 42, which is not on the menu").unwrap());

        assert_eq!(order.state(), OrderState::Rejected);
        let result = order.result().unwrap();
        assert!(!result.success);
        assert!(result.message.contains("not on the menu"));
    }

    #[test]
    fn test_unknown_customer_cannot_be_verified() {
        let mut order = requested("Jane", 1);
        let item = Catalog::standard().lookup(1).unwrap().clone();
        order.apply_events(order.verify_pizza(item, 1).unwrap());

        let result = order.verify_customer(Customer::unknown(), 1);
        assert_eq!(result.unwrap_err(), OrderError::UnknownCustomer);
    }

    #[test]
    fn test_steps_out_of_order_fail() {
        let order = requested("Peter", 1);
        assert!(order.publish().is_err());
        assert!(
            order
                .verify_customer(Directory::standard().lookup("Peter"), 1)
                .is_err()
        );

        let published = awaiting_driver();
        assert!(published.reject("late").is_err());
    }

    #[test]
    fn test_fail_records_step() {
        let mut order = requested("Peter", 1);
        order.apply_events(order.fail("lookup_pizza", 5, "menu unavailable").unwrap());

        assert_eq!(order.state(), OrderState::Failed);
        assert!(order.result().is_none());
        let failure = order.failure().unwrap();
        assert_eq!(failure.step, "lookup_pizza");
        assert_eq!(failure.attempts, 5);
    }

    #[test]
    fn test_cancel_awaiting_order() {
        let mut order = awaiting_driver();
        order.apply_events(order.cancel("customer called").unwrap());

        assert_eq!(order.state(), OrderState::Cancelled);
        assert_eq!(order.cancel_reason(), Some("customer called"));
        assert!(order.assign_driver(tommy("")).is_err());
    }

    #[test]
    fn test_cannot_cancel_finished_order() {
        let mut order = awaiting_driver();
        order.apply_events(order.assign_driver(tommy("")).unwrap());

        assert!(matches!(
            order.cancel("too late"),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }
}
