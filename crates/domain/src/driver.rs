//! Delivery drivers and assignments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub emoji: String,
    pub name: String,
}

impl Driver {
    pub fn new(id: impl Into<String>, emoji: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            emoji: emoji.into(),
            name: name.into(),
        }
    }

    /// Display label, e.g. `🧒 Tommy Brown`.
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }

    /// Builds the assignment event delivered to an awaiting order.
    pub fn assign(&self, note: impl Into<String>) -> DriverAssignment {
        DriverAssignment {
            driver_id: self.id.clone(),
            label: self.label(),
            note: note.into(),
        }
    }
}

/// The external event that resumes an order awaiting a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub driver_id: String,
    pub label: String,
    #[serde(default)]
    pub note: String,
}

/// The drivers available to the dashboard.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    drivers: Vec<Driver>,
}

impl Roster {
    pub fn new(drivers: Vec<Driver>) -> Self {
        Self { drivers }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Driver::new("tommy", "🧒", "Tommy Brown"),
            Driver::new("walter", "👴", "Walter Smith"),
            Driver::new("james", "🧔", "James O'Connor"),
        ])
    }

    /// Finds a driver by id or by display name.
    pub fn find(&self, key: &str) -> Option<&Driver> {
        self.drivers
            .iter()
            .find(|d| d.id == key || d.name == key)
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }
}
