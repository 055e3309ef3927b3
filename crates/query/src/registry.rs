//! Name, label, kind and keyword lookups over a [`Snapshot`].

use std::collections::BTreeMap;

use {
    pulse_metrics::{FamilySnapshot, MetricKind, Sample, Snapshot, suffixes},
    serde::Serialize,
};

/// Pseudo label matching a sample's exposed name in value filters.
pub const NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsByName {
    pub metric_name: String,
    pub families: Vec<FamilySnapshot>,
}

impl MetricsByName {
    #[must_use]
    pub fn count(&self) -> usize {
        self.families.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub help: String,
    pub sample_count: usize,
}

impl From<&FamilySnapshot> for MetricInfo {
    fn from(family: &FamilySnapshot) -> Self {
        Self {
            name: family.name.clone(),
            kind: family.kind,
            help: family.help.clone(),
            sample_count: family.samples.len(),
        }
    }
}

/// `longer` is `prefix` followed by an underscore- or dot-led suffix.
fn extends(longer: &str, prefix: &str) -> bool {
    longer
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(['_', '.']))
}

/// A family matches when its base name equals `query`, or either name
/// extends the other with an underscore or dot suffix. `x_total` finds `x`, and `x`
/// finds `x_bytes`.
#[must_use]
pub fn name_matches(base: &str, query: &str) -> bool {
    base == query || extends(base, query) || extends(query, base)
}

#[must_use]
pub fn metrics_by_name(snapshot: &Snapshot, name: &str) -> MetricsByName {
    MetricsByName {
        metric_name: name.to_owned(),
        families: snapshot
            .families
            .iter()
            .filter(|f| name_matches(&f.name, name))
            .cloned()
            .collect(),
    }
}

#[must_use]
pub fn metrics_by_kind(snapshot: &Snapshot, kind: MetricKind) -> Vec<FamilySnapshot> {
    snapshot
        .families
        .iter()
        .filter(|f| f.kind == kind)
        .cloned()
        .collect()
}

fn passes(sample: &Sample, filter: &BTreeMap<String, String>) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = if key == NAME_LABEL {
            Some(sample.name.as_str())
        } else {
            sample.label(key)
        };
        actual == Some(expected.as_str())
    })
}

/// Samples of every family matching `name` whose labels satisfy `filter`.
/// Counters only contribute their `_total` rows.
#[must_use]
pub fn metric_values(
    snapshot: &Snapshot,
    name: &str,
    filter: &BTreeMap<String, String>,
) -> Vec<LabeledValue> {
    snapshot
        .families
        .iter()
        .filter(|f| name_matches(&f.name, name))
        .flat_map(|family| {
            family.measurements().filter(move |s| {
                family.kind != MetricKind::Counter || s.name.ends_with(suffixes::TOTAL)
            })
        })
        .filter(|s| passes(s, filter))
        .map(|s| LabeledValue {
            labels: s.labels.clone(),
            value: s.value,
        })
        .collect()
}

/// One entry per family, sorted by name.
#[must_use]
pub fn list_all(snapshot: &Snapshot) -> Vec<MetricInfo> {
    let mut infos: Vec<MetricInfo> = snapshot.families.iter().map(MetricInfo::from).collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    infos
}

/// Case-insensitive substring search over name, help and type.
#[must_use]
pub fn search(snapshot: &Snapshot, keyword: &str) -> Vec<MetricInfo> {
    let keyword = keyword.to_lowercase();
    list_all(snapshot)
        .into_iter()
        .filter(|info| {
            info.name.to_lowercase().contains(&keyword)
                || info.help.to_lowercase().contains(&keyword)
                || info.kind.as_str().contains(&keyword)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        pulse_metrics::{FamilyDesc, FrameworkMetrics, MetricStore, StoreOptions, framework},
        std::sync::Arc,
    };

    fn store() -> Arc<MetricStore> {
        let store = Arc::new(MetricStore::new());
        FrameworkMetrics::register(Arc::clone(&store)).unwrap();
        store
            .register(FamilyDesc::gauge("queue_bytes", "Queued payload size", &["queue"]))
            .unwrap();
        store
    }

    #[test]
    fn name_matching_handles_suffix_variants() {
        assert!(name_matches("pulse_received_messages", "pulse_received_messages"));
        assert!(name_matches("pulse_received_messages", "pulse_received_messages_total"));
        assert!(name_matches("queue_bytes", "queue"));
        assert!(!name_matches("queue_bytes", "queu"));
        assert!(name_matches("queue", "queue.depth"));
        assert!(!name_matches("pulse_start_at", "pulse_start_attempts"));
    }

    #[test]
    fn lookup_by_total_name_finds_counter_family() {
        let snapshot = store().collect();
        let found = metrics_by_name(&snapshot, "pulse_received_messages_total");
        assert_eq!(found.count(), 1);
        assert_eq!(found.families[0].name, framework::RECEIVED_MESSAGES);
    }

    #[test]
    fn unknown_name_yields_empty_result() {
        let snapshot = store().collect();
        let found = metrics_by_name(&snapshot, "nope");
        assert_eq!(found.metric_name, "nope");
        assert_eq!(found.count(), 0);
    }

    #[test]
    fn values_filter_on_labels_and_name() {
        let store = store();
        store
            .inc(framework::RECEIVED_MESSAGES, &["1", "Telegram"])
            .unwrap();
        store
            .inc(framework::RECEIVED_MESSAGES, &["2", "Discord"])
            .unwrap();
        let snapshot = store.collect();

        let mut filter = BTreeMap::new();
        filter.insert("bot_id".to_owned(), "1".to_owned());
        let values = metric_values(&snapshot, framework::RECEIVED_MESSAGES, &filter);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 1.0);

        filter.insert(NAME_LABEL.to_owned(), "pulse_received_messages_total".to_owned());
        assert_eq!(
            metric_values(&snapshot, framework::RECEIVED_MESSAGES, &filter).len(),
            1
        );

        filter.insert(NAME_LABEL.to_owned(), "pulse_received_messages_created".to_owned());
        assert!(metric_values(&snapshot, framework::RECEIVED_MESSAGES, &filter).is_empty());
    }

    #[test]
    fn counter_values_skip_created_rows() {
        let store = Arc::new(MetricStore::with_options(StoreOptions { emit_created: true }));
        let fm = FrameworkMetrics::register(Arc::clone(&store)).unwrap();
        fm.message_received("1", "Telegram").unwrap();
        fm.message_received("1", "Telegram").unwrap();
        let snapshot = store.collect();

        let family = snapshot.family(framework::RECEIVED_MESSAGES).unwrap();
        assert_eq!(family.samples.len(), 2);

        let values = metric_values(&snapshot, framework::RECEIVED_MESSAGES, &BTreeMap::new());
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 2.0);
    }

    #[test]
    fn list_is_sorted_and_counts_samples() {
        let store = store();
        store.set("queue_bytes", &["inbound"], 12.0).unwrap();
        let infos = list_all(&store.collect());

        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);

        let queue = infos.iter().find(|i| i.name == "queue_bytes").unwrap();
        assert_eq!(queue.sample_count, 1);
        assert_eq!(queue.kind, MetricKind::Gauge);
    }

    #[test]
    fn search_covers_name_help_and_type() {
        let snapshot = store().collect();
        assert_eq!(search(&snapshot, "PAYLOAD")[0].name, "queue_bytes");
        assert!(search(&snapshot, "histogram")
            .iter()
            .any(|i| i.name == framework::MATCHER_DURATION));
        assert!(search(&snapshot, "zzz").is_empty());
    }

    #[test]
    fn kind_lookup_selects_families() {
        let snapshot = store().collect();
        let histograms = metrics_by_kind(&snapshot, MetricKind::Histogram);
        assert_eq!(histograms.len(), 1);
        assert_eq!(histograms[0].name, framework::MATCHER_DURATION);
    }
}
