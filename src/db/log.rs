//! Query log sink.
//!
//! Finalized entries go to exactly one place: the installed logger callback if
//! there is one, otherwise the sink's own buffer.

use crate::models::QueryLogEntry;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Callback receiving every finalized query log entry.
pub type QueryLogger = Arc<dyn Fn(QueryLogEntry) + Send + Sync>;

#[derive(Default)]
pub struct QuerySink {
    buffer: Mutex<Vec<QueryLogEntry>>,
    logger: RwLock<Option<QueryLogger>>,
}

impl QuerySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route an entry to the logger, or buffer it when none is set.
    ///
    /// No lock is held while the logger runs, so a logger may call back into
    /// the sink.
    pub fn deliver(&self, entry: QueryLogEntry) {
        let logger = self
            .logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match logger {
            Some(logger) => logger(entry),
            None => self
                .buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry),
        }
    }

    pub fn set_logger(&self, logger: Option<QueryLogger>) {
        *self.logger.write().unwrap_or_else(PoisonError::into_inner) = logger;
    }

    /// Snapshot of buffered entries, oldest first.
    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for QuerySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let has_logger = self
            .logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("QuerySink")
            .field("buffered", &self.len())
            .field("has_logger", &has_logger)
            .finish()
    }
}
