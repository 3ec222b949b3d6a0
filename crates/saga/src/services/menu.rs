//! Menu service trait and in-memory simulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Catalog, MenuItem};

use crate::place_order::{CALL_RETRIEVE_MENU, STEP_LOOKUP_PIZZA};
use crate::retry::{ErrorKind, RemoteError};
use crate::services::faults::FaultInjector;

/// Remote access to the pizza menu.
#[async_trait]
pub trait MenuService: Send + Sync {
    /// The whole menu, in menu order.
    async fn retrieve_menu(&self) -> Result<Vec<MenuItem>, RemoteError>;

    /// The item with the given number. A number not on the menu fails with
    /// [`ErrorKind::UnknownPizza`].
    async fn lookup_pizza(&self, number: i32) -> Result<MenuItem, RemoteError>;
}

/// Serves a [`Catalog`] with optional latency and injected failures.
#[derive(Debug, Clone)]
pub struct InMemoryMenuService {
    catalog: Arc<Catalog>,
    faults: FaultInjector,
    latency: Duration,
    calls: Arc<AtomicU32>,
}

impl InMemoryMenuService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            faults: FaultInjector::never(),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_faults(mut self, faults: FaultInjector) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls received so far, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: &str) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.faults.check(call).await
    }
}

#[async_trait]
impl MenuService for InMemoryMenuService {
    #[tracing::instrument(skip(self))]
    async fn retrieve_menu(&self) -> Result<Vec<MenuItem>, RemoteError> {
        self.enter(CALL_RETRIEVE_MENU).await?;
        Ok(self.catalog.items().to_vec())
    }

    #[tracing::instrument(skip(self))]
    async fn lookup_pizza(&self, number: i32) -> Result<MenuItem, RemoteError> {
        self.enter(STEP_LOOKUP_PIZZA).await?;
        self.catalog
            .lookup(number)
            .cloned()
            .map_err(|e| RemoteError::new(ErrorKind::UnknownPizza, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> InMemoryMenuService {
        InMemoryMenuService::new(Arc::new(Catalog::standard()))
    }

    #[tokio::test]
    async fn test_retrieve_menu_in_order() {
        let menu = service().retrieve_menu().await.unwrap();
        let numbers: Vec<_> = menu.iter().map(|item| item.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_lookup_known_pizza() {
        let item = service().lookup_pizza(1).await.unwrap();
        assert_eq!(item.name, "Kebab Pizza");
        assert_eq!(item.price, 75);
    }

    #[tokio::test]
    async fn test_lookup_unknown_pizza() {
        let error = service().lookup_pizza(42).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownPizza);
        assert_eq!(
            error.message,
            "You requested pizza 42, which is not on the menu"
        );
    }

    #[tokio::test]
    async fn test_counts_failed_calls() {
        let menu = service().with_faults(FaultInjector::fail_times(1));
        assert_eq!(
            menu.lookup_pizza(2).await.unwrap_err().kind,
            ErrorKind::Unavailable
        );
        assert!(menu.lookup_pizza(2).await.is_ok());
        assert_eq!(menu.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let menu = service().with_latency(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        menu.lookup_pizza(3).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
