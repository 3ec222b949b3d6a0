//! The fixed pizza menu.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pizza on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub number: i32,
    pub name: String,
    pub price: u32,
}

impl MenuItem {
    pub fn new(number: i32, name: impl Into<String>, price: u32) -> Self {
        Self {
            number,
            name: name.into(),
            price,
        }
    }
}

/// Errors raised by catalog construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The requested pizza is not on the menu.
    #[error("You requested pizza {0}, which is not on the menu")]
    UnknownPizza(i32),

    /// Two menu items share a number.
    #[error("Pizza number {0} appears more than once")]
    DuplicateNumber(i32),

    /// Menu item numbers start at 1.
    #[error("Pizza number must be greater than zero")]
    InvalidNumber,
}

/// Ordered, immutable list of menu items with constant-time lookup by number.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<MenuItem>,
    by_number: HashMap<i32, usize>,
}

impl Catalog {
    /// Builds a catalog, rejecting non-positive or repeated numbers.
    pub fn new(items: Vec<MenuItem>) -> Result<Self, CatalogError> {
        let mut by_number = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if item.number <= 0 {
                return Err(CatalogError::InvalidNumber);
            }
            if by_number.insert(item.number, idx).is_some() {
                return Err(CatalogError::DuplicateNumber(item.number));
            }
        }
        Ok(Self { items, by_number })
    }

    /// The house menu.
    pub fn standard() -> Self {
        let items = vec![
            MenuItem::new(1, "Kebab Pizza", 75),
            MenuItem::new(2, "Vesuvio", 60),
            MenuItem::new(3, "Hawaiian", 65),
            MenuItem::new(4, "Margherita", 55),
            MenuItem::new(5, "Capricciosa", 60),
        ];
        let by_number = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.number, idx))
            .collect();
        Self { items, by_number }
    }

    pub fn lookup(&self, number: i32) -> Result<&MenuItem, CatalogError> {
        self.by_number
            .get(&number)
            .map(|&idx| &self.items[idx])
            .ok_or(CatalogError::UnknownPizza(number))
    }

    pub fn contains(&self, number: i32) -> bool {
        self.by_number.contains_key(&number)
    }

    /// Items in menu order.
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_menu_lookup() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.len(), 5);

        let kebab = catalog.lookup(1).unwrap();
        assert_eq!(kebab.name, "Kebab Pizza");
        assert_eq!(kebab.price, 75);
        assert_eq!(catalog.lookup(4).unwrap().name, "Margherita");
    }

    #[test]
    fn test_unknown_pizza() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.lookup(42), Err(CatalogError::UnknownPizza(42)));
        assert_eq!(catalog.lookup(0), Err(CatalogError::UnknownPizza(0)));
        assert_eq!(catalog.lookup(-1), Err(CatalogError::UnknownPizza(-1)));
        assert!(!catalog.contains(6));
    }

    #[test]
    fn test_unknown_pizza_message() {
        assert_eq!(
            CatalogError::UnknownPizza(42).to_string(),
            "You requested pizza 42, which is not on the menu"
        );
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let result = Catalog::new(vec![
            MenuItem::new(1, "Kebab Pizza", 75),
            MenuItem::new(1, "Vesuvio", 60),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateNumber(1))));
    }

    #[test]
    fn test_non_positive_numbers_rejected() {
        let result = Catalog::new(vec![MenuItem::new(0, "Nothing", 1)]);
        assert!(matches!(result, Err(CatalogError::InvalidNumber)));
        let result = Catalog::new(vec![MenuItem::new(-3, "Less than nothing", 1)]);
        assert!(matches!(result, Err(CatalogError::InvalidNumber)));
    }

    #[test]
    fn test_items_keep_menu_order() {
        let catalog = Catalog::new(vec![
            MenuItem::new(7, "Calzone", 70),
            MenuItem::new(3, "Hawaiian", 65),
        ])
        .unwrap();
        let numbers: Vec<_> = catalog.items().iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![7, 3]);
    }
}
