//! Timestamp resolution from trace and date headers.
//!
//! Priority:
//! 1. the latest parseable `Received` header,
//! 2. the `Date` header,
//! 3. the Unix epoch, flagged as having no timestamp.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::parser::header::{parse_date, received_date, RawHeaders};

/// Where a resolved timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Received,
    Date,
    Epoch,
}

/// Result of timestamp resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTime {
    pub instant: DateTime<Utc>,
    pub source: TimeSource,
}

/// Resolve the best-available handling time for a message.
///
/// `path` is only used for log context. Never fails.
pub fn resolve_timestamp(headers: &RawHeaders, path: &Path) -> ResolvedTime {
    let mut latest: Option<DateTime<Utc>> = None;
    let mut seen_received = false;

    for (i, value) in headers.all("received").enumerate() {
        seen_received = true;
        match received_date(value) {
            Some(t) => latest = Some(latest.map_or(t, |l| l.max(t))),
            None if i == 0 => warn!(
                path = %path.display(),
                "Could not parse the first Received date, trying the others"
            ),
            None => debug!(path = %path.display(), index = i, "Skipping unparseable Received date"),
        }
    }

    if let Some(instant) = latest {
        return ResolvedTime {
            instant,
            source: TimeSource::Received,
        };
    }

    if seen_received {
        debug!(path = %path.display(), "No usable Received date, falling back to Date header");
    }

    if let Some(instant) = headers.first("date").and_then(parse_date) {
        return ResolvedTime {
            instant,
            source: TimeSource::Date,
        };
    }

    warn!(path = %path.display(), "No timestamp information, using Unix epoch");
    ResolvedTime {
        instant: DateTime::UNIX_EPOCH,
        source: TimeSource::Epoch,
    }
}
