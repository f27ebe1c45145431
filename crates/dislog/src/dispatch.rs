//! Feeds gateway events into the event logger
//!
//! Reads one gateway dispatch per line until the input ends or shutdown is
//! requested. Bad lines and failed appends are logged and skipped; nothing
//! here stops the loop except the input or the shutdown signal.

use std::future::Future;
use std::sync::Arc;

use dislog_storage::EventLogger;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use crate::gateway::GatewayEvent;
use crate::translate::Translator;

/// Counters for one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Non-blank lines read
    pub received: u64,
    /// Entries written
    pub logged: u64,
    /// Events without a guild or of a kind that is not logged
    pub skipped: u64,
    /// Lines that could not be parsed
    pub malformed: u64,
    /// Entries dropped because encoding failed
    pub dropped: u64,
    /// Entries lost to storage errors
    pub failed: u64,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The input was exhausted
    EndOfInput,
    /// Shutdown was requested
    Shutdown,
}

/// Routes gateway lines through translation into the logger
#[derive(Debug)]
pub struct Dispatcher {
    logger: Arc<EventLogger>,
    translator: Translator,
}

impl Dispatcher {
    /// Create a dispatcher writing to `logger`
    pub fn new(logger: Arc<EventLogger>) -> Self {
        Self {
            logger,
            translator: Translator::new(),
        }
    }

    /// The translator (and its channel directory)
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Process lines from `input` until it ends or `shutdown` resolves
    ///
    /// A line already being appended when shutdown fires is finished first.
    pub async fn run<R, F>(
        &self,
        input: R,
        shutdown: F,
    ) -> std::io::Result<(StopReason, DispatchStats)>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        let mut lines = input.lines();
        let mut stats = DispatchStats::default();
        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break StopReason::Shutdown,
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line, &mut stats).await,
                    None => break StopReason::EndOfInput,
                },
            }
        };

        info!(
            reason = ?reason,
            received = stats.received,
            logged = stats.logged,
            skipped = stats.skipped,
            malformed = stats.malformed,
            dropped = stats.dropped,
            failed = stats.failed,
            "Dispatch stopped"
        );
        Ok((reason, stats))
    }

    /// Handle one input line
    pub async fn handle_line(&self, line: &str, stats: &mut DispatchStats) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        stats.received += 1;

        let event = match GatewayEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                stats.malformed += 1;
                warn!(error = %e, "Skipping unreadable gateway line");
                return;
            }
        };

        let Some((guild, entry)) = self.translator.translate(&event) else {
            stats.skipped += 1;
            return;
        };

        match self.logger.append_entry(guild, &entry).await {
            Ok(()) => {
                stats.logged += 1;
                debug!(guild = %guild, kind = %entry.kind(), "Logged event");
            }
            Err(e) if e.is_input_error() => {
                stats.dropped += 1;
                warn!(guild = %guild, kind = %entry.kind(), error = %e, "Dropping entry that failed to encode");
            }
            Err(e) => {
                stats.failed += 1;
                error!(guild = %guild, kind = %entry.kind(), error = %e, "Failed to log event");
            }
        }
    }
}
