//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► MenuVerified ──► CustomerVerified ──► AwaitingDriver ──► Succeeded
///    │             │
///    └─────────────┴──► Rejected
///
/// any non-terminal state ──► Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Request recorded, pizza not yet checked.
    #[default]
    Created,

    /// The pizza is on the menu.
    MenuVerified,

    /// The customer is known.
    CustomerVerified,

    /// Published to the dashboard; waiting for a driver.
    AwaitingDriver,

    /// A driver accepted the order (terminal state).
    Succeeded,

    /// Business rule rejected the order (terminal state).
    Rejected,

    /// A remote step failed past its retry policy (terminal state).
    Failed,

    /// Cancelled by an operator (terminal state).
    Cancelled,
}

impl OrderState {
    pub fn can_verify_pizza(&self) -> bool {
        matches!(self, OrderState::Created)
    }

    pub fn can_verify_customer(&self) -> bool {
        matches!(self, OrderState::MenuVerified)
    }

    /// Business rejections only happen during verification.
    pub fn can_reject(&self) -> bool {
        matches!(self, OrderState::Created | OrderState::MenuVerified)
    }

    pub fn can_publish(&self) -> bool {
        matches!(self, OrderState::CustomerVerified)
    }

    pub fn can_assign_driver(&self) -> bool {
        matches!(self, OrderState::AwaitingDriver)
    }

    pub fn can_fail(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Succeeded | OrderState::Rejected | OrderState::Failed | OrderState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "Created",
            OrderState::MenuVerified => "MenuVerified",
            OrderState::CustomerVerified => "CustomerVerified",
            OrderState::AwaitingDriver => "AwaitingDriver",
            OrderState::Succeeded => "Succeeded",
            OrderState::Rejected => "Rejected",
            OrderState::Failed => "Failed",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderState; 8] = [
        OrderState::Created,
        OrderState::MenuVerified,
        OrderState::CustomerVerified,
        OrderState::AwaitingDriver,
        OrderState::Succeeded,
        OrderState::Rejected,
        OrderState::Failed,
        OrderState::Cancelled,
    ];

    #[test]
    fn test_default_state_is_created() {
        assert_eq!(OrderState::default(), OrderState::Created);
    }

    #[test]
    fn test_each_step_has_one_entry_state() {
        let verify_pizza: Vec<_> = ALL.iter().filter(|s| s.can_verify_pizza()).collect();
        let verify_customer: Vec<_> = ALL.iter().filter(|s| s.can_verify_customer()).collect();
        let publish: Vec<_> = ALL.iter().filter(|s| s.can_publish()).collect();
        let assign: Vec<_> = ALL.iter().filter(|s| s.can_assign_driver()).collect();

        assert_eq!(verify_pizza, vec![&OrderState::Created]);
        assert_eq!(verify_customer, vec![&OrderState::MenuVerified]);
        assert_eq!(publish, vec![&OrderState::CustomerVerified]);
        assert_eq!(assign, vec![&OrderState::AwaitingDriver]);
    }

    #[test]
    fn test_reject_only_during_verification() {
        assert!(OrderState::Created.can_reject());
        assert!(OrderState::MenuVerified.can_reject());
        assert!(!OrderState::CustomerVerified.can_reject());
        assert!(!OrderState::AwaitingDriver.can_reject());
        assert!(!OrderState::Succeeded.can_reject());
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![
                &OrderState::Succeeded,
                &OrderState::Rejected,
                &OrderState::Failed,
                &OrderState::Cancelled
            ]
        );
        for state in ALL {
            assert_eq!(state.can_cancel(), !state.is_terminal());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderState::AwaitingDriver.to_string(), "AwaitingDriver");
        assert_eq!(OrderState::Succeeded.to_string(), "Succeeded");
    }

    #[test]
    fn test_serialization() {
        let state = OrderState::MenuVerified;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"MenuVerified\"");
        let deserialized: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
