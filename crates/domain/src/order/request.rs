use serde::{Deserialize, Serialize};

/// A customer's request to place an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_name: String,
    pub pizza_number: i32,
}

impl OrderRequest {
    pub fn new(customer_name: impl Into<String>, pizza_number: i32) -> Self {
        Self {
            customer_name: customer_name.into(),
            pizza_number,
        }
    }
}

/// The business outcome of a finished order.
///
/// A rejection is a result with `success == false`, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderResult {
    pub success: bool,
    pub message: String,
}

impl PlaceOrderResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: reason.into(),
        }
    }
}
