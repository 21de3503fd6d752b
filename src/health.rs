use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::rpc::ChainTransport;

/// Result of the most recent node check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Default)]
pub struct HealthMonitor {
    last: RwLock<Option<(Result<u64, String>, DateTime<Utc>)>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> HealthReport {
        let last = self.last.read().unwrap_or_else(PoisonError::into_inner);
        match &*last {
            Some((Ok(block), at)) => HealthReport {
                status: "ok",
                block: Some(*block),
                checked_at: Some(*at),
            },
            Some((Err(_), at)) => HealthReport {
                status: "unavailable",
                block: None,
                checked_at: Some(*at),
            },
            None => HealthReport {
                status: "unavailable",
                block: None,
                checked_at: None,
            },
        }
    }

    /// Asks the node for its head block once and records the outcome.
    pub async fn check(&self, transport: &dyn ChainTransport) {
        let outcome = match transport.block_number().await {
            Ok(block) => {
                debug!(block, "node health check passed");
                Ok(block)
            }
            Err(e) => {
                warn!("node health check failed: {}", e);
                Err(e.to_string())
            }
        };
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some((outcome, Utc::now()));
    }

    pub async fn run(self: Arc<Self>, transport: Arc<dyn ChainTransport>, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.check(transport.as_ref()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubTransport;

    #[test]
    fn unavailable_before_first_check() {
        let monitor = HealthMonitor::new();
        let report = monitor.report();
        assert!(!report.is_ok());
        assert!(report.checked_at.is_none());
    }

    #[tokio::test]
    async fn check_records_block_or_failure() {
        let transport = StubTransport::new();
        let monitor = HealthMonitor::new();

        transport.set_block_number(Some(1234));
        monitor.check(transport.as_ref()).await;
        let report = monitor.report();
        assert!(report.is_ok());
        assert_eq!(report.block, Some(1234));

        transport.set_block_number(None);
        monitor.check(transport.as_ref()).await;
        let report = monitor.report();
        assert!(!report.is_ok());
        assert!(report.checked_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_checking() {
        let transport = StubTransport::new();
        transport.set_block_number(Some(1));
        let monitor = Arc::new(HealthMonitor::new());

        let task = tokio::spawn(Arc::clone(&monitor).run(transport.clone(), Duration::from_secs(10)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(monitor.report().block, Some(1));

        transport.set_block_number(Some(2));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(monitor.report().block, Some(2));
        task.abort();
    }
}
