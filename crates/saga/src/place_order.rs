//! Place-order saga constants.

/// The saga type identifier, shared with the order stream type.
pub const SAGA_TYPE: &str = "PlaceOrder";

/// Step name: look the requested pizza up on the menu.
pub const STEP_LOOKUP_PIZZA: &str = "lookup_pizza";

/// Step name: look the customer up in the directory.
pub const STEP_LOOKUP_CUSTOMER: &str = "lookup_customer";

/// Step name: publish the verified order to the dashboard.
pub const STEP_PUBLISH: &str = "publish_order";

/// Step name: wait for the dashboard to assign a driver.
pub const STEP_AWAIT_DRIVER: &str = "await_driver";

/// Call name used when the whole menu is fetched.
pub const CALL_RETRIEVE_MENU: &str = "retrieve_menu";

/// Rejection reason for a customer the directory does not know.
pub fn unknown_customer_reason(name: &str) -> String {
    format!("{name} is not a known customer")
}
