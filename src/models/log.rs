//! Query log entries.

use crate::models::{ParamValue, Placeholder};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::backtrace::Backtrace;
use std::time::Instant;

/// Statement label for [`Connection::begin_transaction`](crate::db::Connection::begin_transaction).
pub const BEGIN_TRANSACTION: &str = "Connection::begin_transaction";
/// Statement label for [`Connection::commit`](crate::db::Connection::commit).
pub const COMMIT: &str = "Connection::commit";
/// Statement label for [`Connection::rollback`](crate::db::Connection::rollback).
pub const ROLLBACK: &str = "Connection::rollback";

/// One executed operation: timing, statement, bound values and call trace.
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
    /// `"ROLE:name"` or `"DEFAULT"`; only set for entries routed through a locator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    pub start: DateTime<Utc>,
    pub finish: Option<DateTime<Utc>>,
    /// Seconds between `start` and `finish`.
    pub duration: Option<f64>,
    /// Only set for transaction control; `true` once the driver call succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed: Option<bool>,
    pub statement: String,
    pub values: IndexMap<Placeholder, ParamValue>,
    pub trace: String,
    #[serde(skip)]
    started: Instant,
}

impl QueryLogEntry {
    /// Open an entry for an operation that is about to start.
    pub fn begin(statement: impl Into<String>, values: IndexMap<Placeholder, ParamValue>) -> Self {
        Self {
            connection: None,
            start: Utc::now(),
            finish: None,
            duration: None,
            performed: None,
            statement: statement.into(),
            values,
            trace: String::new(),
            started: Instant::now(),
        }
    }

    /// Stamp finish time, duration and call trace.
    ///
    /// `finish` is measured on the monotonic clock from `start`, so it never
    /// precedes it.
    pub fn finish(&mut self) {
        let elapsed = self.started.elapsed();
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());
        let finish = self.start + elapsed;
        self.finish = Some(finish);
        self.duration = Some(seconds_between(self.start, finish));
        self.trace = capture_trace();
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }
}

fn seconds_between(start: DateTime<Utc>, finish: DateTime<Utc>) -> f64 {
    let delta = finish - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

fn capture_trace() -> String {
    let trace = Backtrace::force_capture().to_string();
    if trace.trim().is_empty() {
        "<backtrace unavailable>".to_string()
    } else {
        trace
    }
}
