//! Immutable point-in-time copies of the registry.

use serde::{Deserialize, Serialize};

use crate::{definitions::suffixes, store::MetricKind};

/// One exposed sample row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Exposed name, including suffixes such as `_total` or `_bucket`.
    pub name: String,
    /// Label pairs sorted by label name.
    pub labels: Vec<(String, String)>,
    pub value: f64,
    /// Milliseconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Sample {
    pub fn new(name: impl Into<String>, mut labels: Vec<(String, String)>, value: f64) -> Self {
        labels.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.into(),
            labels,
            value,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `_created` rows carry creation timestamps, not measurements.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.name.ends_with(suffixes::CREATED)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub help: String,
    pub samples: Vec<Sample>,
}

impl FamilySnapshot {
    /// Samples that are measurements, i.e. everything but `_created` rows.
    pub fn measurements(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| !s.is_created())
    }
}

/// All families, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub families: Vec<FamilySnapshot>,
}

impl Snapshot {
    #[must_use]
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
