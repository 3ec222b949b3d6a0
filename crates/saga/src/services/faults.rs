//! Injectable failures for the simulated remote services.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;

use crate::retry::{ErrorKind, RemoteError};

/// When a simulated call fails.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultMode {
    Never,
    /// Fail this many calls, then succeed.
    FailNext(u32),
    Always,
    /// One entry per call, `true` meaning fail. Succeeds once exhausted.
    Scripted(VecDeque<bool>),
    /// Fail each call with the given probability.
    Random { rate: f64 },
}

/// Decides whether a simulated call fails, and with what.
///
/// Clones share the same mode.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    mode: Arc<Mutex<FaultMode>>,
    kind: ErrorKind,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::never()
    }
}

impl FaultInjector {
    pub fn new(mode: FaultMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            kind: ErrorKind::Unavailable,
        }
    }

    pub fn never() -> Self {
        Self::new(FaultMode::Never)
    }

    pub fn fail_times(n: u32) -> Self {
        Self::new(FaultMode::FailNext(n))
    }

    pub fn always() -> Self {
        Self::new(FaultMode::Always)
    }

    pub fn scripted(script: impl IntoIterator<Item = bool>) -> Self {
        Self::new(FaultMode::Scripted(script.into_iter().collect()))
    }

    /// Fails roughly `rate` of all calls. The demo server uses 0.2.
    pub fn random(rate: f64) -> Self {
        Self::new(FaultMode::Random { rate })
    }

    /// Sets the error kind injected failures carry.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub async fn set_mode(&self, mode: FaultMode) {
        *self.mode.lock().await = mode;
    }

    /// Consumes one decision for a call named `call`.
    pub async fn check(&self, call: &str) -> Result<(), RemoteError> {
        let fail = {
            let mut mode = self.mode.lock().await;
            match &mut *mode {
                FaultMode::Never => false,
                FaultMode::Always => true,
                FaultMode::FailNext(remaining) => {
                    let fail = *remaining > 0;
                    *remaining = remaining.saturating_sub(1);
                    fail
                }
                FaultMode::Scripted(script) => script.pop_front().unwrap_or(false),
                FaultMode::Random { rate } => {
                    let p = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
                    rand::rng().random_bool(p)
                }
            }
        };

        if fail {
            tracing::debug!(call, kind = %self.kind, "injecting remote failure");
            Err(RemoteError::new(
                self.kind,
                format!("{call} is temporarily unavailable"),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn outcomes(faults: &FaultInjector, n: usize) -> Vec<bool> {
        let mut seen = Vec::with_capacity(n);
        for _ in 0..n {
            seen.push(faults.check("lookup_pizza").await.is_err());
        }
        seen
    }

    #[tokio::test]
    async fn test_never_and_always() {
        assert_eq!(outcomes(&FaultInjector::never(), 3).await, vec![false; 3]);
        assert_eq!(outcomes(&FaultInjector::always(), 3).await, vec![true; 3]);
    }

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let faults = FaultInjector::fail_times(2);
        assert_eq!(outcomes(&faults, 4).await, vec![true, true, false, false]);
    }

    #[tokio::test]
    async fn test_scripted() {
        let faults = FaultInjector::scripted([false, true, false]);
        assert_eq!(
            outcomes(&faults, 4).await,
            vec![false, true, false, false]
        );
    }

    #[tokio::test]
    async fn test_random_extremes() {
        assert_eq!(outcomes(&FaultInjector::random(0.0), 20).await, vec![false; 20]);
        assert_eq!(outcomes(&FaultInjector::random(1.0), 20).await, vec![true; 20]);
    }

    #[tokio::test]
    async fn test_injected_error_kind() {
        let faults = FaultInjector::always().with_kind(ErrorKind::Network);
        let error = faults.check("lookup_customer").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_clones_share_mode() {
        let faults = FaultInjector::never();
        let clone = faults.clone();
        clone.set_mode(FaultMode::Always).await;
        assert!(faults.check("lookup_pizza").await.is_err());
    }
}
