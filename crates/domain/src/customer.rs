//! Known customers and their delivery details.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A customer record.
///
/// The unknown sentinel (see [`Customer::unknown`]) has every field empty;
/// a record is never partially populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub address: String,
    pub delivery: Duration,
}

impl Customer {
    pub fn new(name: impl Into<String>, address: impl Into<String>, delivery: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            delivery,
        }
    }

    /// The record returned for names the directory does not know.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        !self.name.is_empty()
    }

    /// Delivery estimate in compact form, e.g. `5m`, `1h` or `1h30m`.
    pub fn delivery_label(&self) -> String {
        compact_duration(self.delivery)
    }
}

/// Formats whole seconds as `XhYmZs`, omitting zero components.
pub fn compact_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "0s".to_string();
    }

    [(total / 3600, 'h'), (total % 3600 / 60, 'm'), (total % 60, 's')]
        .into_iter()
        .filter(|(amount, _)| *amount > 0)
        .map(|(amount, unit)| format!("{amount}{unit}"))
        .collect()
}

/// Name lookup over the known customers. Several aliases may map to the
/// same customer.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    by_alias: HashMap<String, Customer>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a customer under each of the given aliases.
    pub fn with_customer<'a>(
        mut self,
        customer: Customer,
        aliases: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        for alias in aliases {
            self.by_alias.insert(alias.to_string(), customer.clone());
        }
        self
    }

    /// The directory the shop ships with.
    pub fn standard() -> Self {
        Self::new()
            .with_customer(
                Customer::new(
                    "Peter Hellberg",
                    "Mosstenabacken 1, 12432 Bandhagen",
                    Duration::from_secs(5 * 60),
                ),
                ["Peter", "Peter Hellberg"],
            )
            .with_customer(
                Customer::new(
                    "John Doe",
                    "Fakestreet 0, 12345 Nowhere",
                    Duration::from_secs(60 * 60),
                ),
                ["John", "John Doe"],
            )
    }

    /// Looks a customer up by alias. Unknown names yield [`Customer::unknown`].
    pub fn lookup(&self, name: &str) -> Customer {
        self.by_alias.get(name).cloned().unwrap_or_default()
    }
}
