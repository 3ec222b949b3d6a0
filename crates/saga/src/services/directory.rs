//! Customer directory trait and in-memory simulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Customer, Directory};

use crate::place_order::STEP_LOOKUP_CUSTOMER;
use crate::retry::RemoteError;
use crate::services::faults::FaultInjector;

/// Remote access to the customer directory.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Resolves a customer by name or alias.
    ///
    /// A name the directory does not know is not an error: it resolves to
    /// [`Customer::unknown`].
    async fn lookup_customer(&self, name: &str) -> Result<Customer, RemoteError>;
}

/// Serves a [`Directory`] with optional latency and injected failures.
#[derive(Debug, Clone)]
pub struct InMemoryCustomerDirectory {
    directory: Arc<Directory>,
    faults: FaultInjector,
    latency: Duration,
    calls: Arc<AtomicU32>,
}

impl InMemoryCustomerDirectory {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self {
            directory,
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

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    #[tracing::instrument(skip(self))]
    async fn lookup_customer(&self, name: &str) -> Result<Customer, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.faults.check(STEP_LOOKUP_CUSTOMER).await?;
        Ok(self.directory.lookup(name))
    }
}
