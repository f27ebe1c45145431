//! Shutdown coordination

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument};

use crate::cache::CloseReport;
use crate::logger::EventLogger;

/// Closes a logger's files exactly once on shutdown
///
/// Whoever feeds the logger must stop doing so before calling
/// [`shutdown`](Self::shutdown); appends arriving afterwards reopen files.
#[derive(Debug)]
pub struct Lifecycle {
    logger: Arc<EventLogger>,
    shut_down: AtomicBool,
}

impl Lifecycle {
    /// Manage `logger`
    pub fn new(logger: Arc<EventLogger>) -> Self {
        Self {
            logger,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The managed logger
    pub fn logger(&self) -> &Arc<EventLogger> {
        &self.logger
    }

    /// Flush and close every open file
    ///
    /// Returns the close report on the first call and `None` on any later
    /// call, which does nothing.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Option<CloseReport> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already performed");
            return None;
        }

        let report = self.logger.close_all().await;
        info!(
            closed = report.closed,
            failures = report.failures,
            "Event logger shut down"
        );
        Some(report)
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use dislog_core::EntityId;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_shutdown_runs_once() {
        let temp = TempDir::new().unwrap();
        let logger = Arc::new(EventLogger::new(LoggerConfig::with_base_dir(temp.path())));
        let lifecycle = Lifecycle::new(logger.clone());

        logger.append(EntityId::new(1), "msg", &json!({})).await.unwrap();
        logger.append(EntityId::new(2), "msg", &json!({})).await.unwrap();

        assert!(!lifecycle.is_shut_down());
        let report = lifecycle.shutdown().await.unwrap();
        assert_eq!(report.closed, 2);
        assert!(lifecycle.is_shut_down());

        assert!(lifecycle.shutdown().await.is_none());
        assert_eq!(logger.stats().closed, 2);
    }

    #[tokio::test]
    async fn test_shutdown_with_nothing_open() {
        let temp = TempDir::new().unwrap();
        let logger = Arc::new(EventLogger::new(LoggerConfig::with_base_dir(temp.path())));
        let lifecycle = Lifecycle::new(logger);

        assert_eq!(lifecycle.shutdown().await, Some(CloseReport::default()));
    }
}
