//! # Activity Log
//!
//! Record of the writes performed against the KG, in order.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Create,
    Update,
    /// Save found nothing to change.
    NoChange,
    Delete,
    Release,
    Unrelease,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::NoChange => "no change",
            Self::Delete => "delete",
            Self::Release => "release",
            Self::Unrelease => "unrelease",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub class_name: String,
    pub id: String,
    pub space: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Vec<Activity>,
}

impl ActivityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: ActivityKind,
        class_name: impl Into<String>,
        id: impl Into<String>,
        space: Option<String>,
    ) {
        self.entries.push(Activity {
            kind,
            class_name: class_name.into(),
            id: id.into(),
            space,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[Activity] {
        &self.entries
    }

    /// Count of entries per kind.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<ActivityKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_by_kind() {
        let mut log = ActivityLog::new();
        log.record(ActivityKind::Create, "Person", "a", Some("common".into()));
        log.record(ActivityKind::Create, "Person", "b", Some("common".into()));
        log.record(ActivityKind::NoChange, "Organization", "c", None);
        let summary = log.summary();
        assert_eq!(summary.get(&ActivityKind::Create), Some(&2));
        assert_eq!(summary.get(&ActivityKind::NoChange), Some(&1));
        assert_eq!(summary.get(&ActivityKind::Delete), None);
        assert_eq!(log.len(), 3);
        log.clear();
        assert!(log.is_empty());
    }
}
