//! Backup directory naming.
//!
//! A backup identifier is the configured prefix followed by the UTC start time of the
//! run. The timestamp is fixed width and zero padded, so for a given prefix sorting
//! identifiers as strings sorts them chronologically.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use derive_more::Display;
use getset::Getters;
use std::cmp::Ordering;

/// Timestamp part of an identifier; one backup per distinct second.
pub static TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Builds the identifier for a backup started at `timestamp`.
///
/// Sub-second precision is dropped by the format.
pub fn make_identifier(prefix: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}{}", prefix, timestamp.format(TIME_FORMAT))
}

/// Decodes the start time from a remote directory name.
///
/// Returns `None` when `name` does not start with `prefix` or the rest is not exactly
/// a timestamp as produced by [`make_identifier`].
pub fn parse_identifier(prefix: &str, name: &str) -> Option<DateTime<Utc>> {
    let suffix = name.strip_prefix(prefix)?;
    let timestamp = NaiveDateTime::parse_from_str(suffix, TIME_FORMAT)
        .ok()?
        .and_utc();

    // chrono accepts unpadded fields, only the canonical rendering is ours
    (timestamp.format(TIME_FORMAT).to_string() == suffix).then_some(timestamp)
}

#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, Getters)]
#[display("{name}")]
#[getset(get = "pub")]
pub struct BackupId {
    name: String,
    timestamp: DateTime<Utc>,
}

impl BackupId {
    pub fn new(prefix: &str, timestamp: DateTime<Utc>) -> Self {
        let timestamp = timestamp.trunc_subsecs(0);
        Self {
            name: make_identifier(prefix, &timestamp),
            timestamp,
        }
    }

    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        parse_identifier(prefix, name).map(|timestamp| Self {
            name: name.to_string(),
            timestamp,
        })
    }
}

impl Ord for BackupId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for BackupId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
