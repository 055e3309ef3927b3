//! Thread-safe registry of metric families keyed by label values.
//!
//! Families are registered once and never removed. Series are created lazily
//! on the first mutation of a new label combination and live for the process
//! lifetime. Counter and gauge series are single atomics; histogram series
//! hold their bucket array behind a small mutex.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use {
    dashmap::DashMap,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    collector,
    definitions::{buckets, labels, suffixes},
    error::{MetricsError, Result},
    snapshot::Snapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = &'static str;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "counter" => Ok(Self::Counter),
            "gauge" => Ok(Self::Gauge),
            "histogram" => Ok(Self::Histogram),
            _ => Err("invalid metric kind"),
        }
    }
}

/// Static description of a metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyDesc {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    /// Label names in the order label values are supplied to mutations.
    pub label_names: Vec<String>,
    /// Upper bounds, ascending. Histogram only.
    pub buckets: Vec<f64>,
}

impl FamilyDesc {
    pub fn counter(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, MetricKind::Counter, help, label_names, Vec::new())
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, MetricKind::Gauge, help, label_names, Vec::new())
    }

    /// An empty `buckets` slice selects [`buckets::DEFAULT`].
    pub fn histogram(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Self {
        Self::new(
            name,
            MetricKind::Histogram,
            help,
            label_names,
            buckets.to_vec(),
        )
    }

    fn new(
        name: impl Into<String>,
        kind: MetricKind,
        help: impl Into<String>,
        label_names: &[&str],
        buckets: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            help: help.into(),
            label_names: label_names.iter().map(|l| (*l).to_owned()).collect(),
            buckets,
        }
    }

    /// Every sample name this family can expose, its base name included.
    fn exposed_names(&self) -> Vec<String> {
        let suffixes: &[&str] = match self.kind {
            MetricKind::Counter => &[suffixes::TOTAL, suffixes::CREATED],
            MetricKind::Gauge => &[],
            MetricKind::Histogram => &[
                suffixes::BUCKET,
                suffixes::SUM,
                suffixes::COUNT,
                suffixes::CREATED,
            ],
        };
        std::iter::once(self.name.clone())
            .chain(suffixes.iter().map(|s| format!("{}{s}", self.name)))
            .collect()
    }

    /// Validate names and buckets and bring the description into canonical form.
    fn normalize(mut self) -> Result<Self> {
        if self.kind == MetricKind::Counter
            && let Some(stripped) = self.name.strip_suffix(suffixes::TOTAL)
            && !stripped.is_empty()
        {
            self.name = stripped.to_owned();
        }
        validate_metric_name(&self.name)?;

        for (i, label) in self.label_names.iter().enumerate() {
            validate_label_name(label)?;
            if self.label_names[..i].contains(label) {
                return Err(MetricsError::InvalidName {
                    name: label.clone(),
                    reason: "duplicate label name",
                });
            }
            if self.kind == MetricKind::Histogram && label == labels::LE {
                return Err(MetricsError::InvalidName {
                    name: label.clone(),
                    reason: "'le' is reserved for histogram buckets",
                });
            }
        }

        match self.kind {
            MetricKind::Histogram => {
                if self.buckets.is_empty() {
                    self.buckets = buckets::DEFAULT.clone();
                }
                if self.buckets.iter().any(|b| b.is_nan()) {
                    return Err(MetricsError::InvalidBuckets {
                        name: self.name,
                        reason: "bucket bounds must not be NaN",
                    });
                }
                if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(MetricsError::InvalidBuckets {
                        name: self.name,
                        reason: "bucket bounds must be strictly ascending",
                    });
                }
                if self.buckets.last() != Some(&f64::INFINITY) {
                    self.buckets.push(f64::INFINITY);
                }
            },
            MetricKind::Counter | MetricKind::Gauge => {
                if !self.buckets.is_empty() {
                    return Err(MetricsError::InvalidBuckets {
                        name: self.name,
                        reason: "only histograms take buckets",
                    });
                }
            },
        }

        Ok(self)
    }
}

fn validate_metric_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return Err(MetricsError::InvalidName {
            name: name.to_owned(),
            reason: "must match [a-zA-Z_:][a-zA-Z0-9_:]*",
        });
    }
    Ok(())
}

fn validate_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MetricsError::InvalidName {
            name: name.to_owned(),
            reason: "must match [a-zA-Z_][a-zA-Z0-9_]*",
        });
    }
    if name.starts_with("__") {
        return Err(MetricsError::InvalidName {
            name: name.to_owned(),
            reason: "names starting with '__' are reserved",
        });
    }
    Ok(())
}

/// Store-wide collection options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Emit `<name>_created` samples for counter and histogram series.
    pub emit_created: bool,
}

/// Current value of one series.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Scalar(f64),
    Histogram(HistogramReading),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramReading {
    /// `(upper bound, cumulative count)` ascending, ending with `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

// ── Series ───────────────────────────────────────────────────────────────────

/// `f64` stored as bits so it can be updated without a lock.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    fn update(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Debug)]
struct HistogramState {
    /// Cumulative counts, one per bound.
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

#[derive(Debug)]
enum SeriesValue {
    Scalar(AtomicF64),
    Histogram(Mutex<HistogramState>),
}

#[derive(Debug)]
pub(crate) struct Series {
    seq: u64,
    label_values: Vec<String>,
    created: f64,
    value: SeriesValue,
}

impl Series {
    fn new(seq: u64, label_values: Vec<String>, kind: MetricKind, bucket_count: usize) -> Self {
        let value = match kind {
            MetricKind::Counter | MetricKind::Gauge => SeriesValue::Scalar(AtomicF64::new(0.0)),
            MetricKind::Histogram => SeriesValue::Histogram(Mutex::new(HistogramState {
                buckets: vec![0; bucket_count],
                sum: 0.0,
                count: 0,
            })),
        };
        Self {
            seq,
            label_values,
            created: now_unix(),
            value,
        }
    }

    pub(crate) fn label_values(&self) -> &[String] {
        &self.label_values
    }

    pub(crate) fn created(&self) -> f64 {
        self.created
    }

    pub(crate) fn add(&self, delta: f64) {
        if let SeriesValue::Scalar(v) = &self.value {
            v.update(|current| current + delta);
        }
    }

    pub(crate) fn set(&self, value: f64) {
        if let SeriesValue::Scalar(v) = &self.value {
            v.store(value);
        }
    }

    pub(crate) fn raise_to(&self, value: f64) {
        if let SeriesValue::Scalar(v) = &self.value {
            v.update(|current| current.max(value));
        }
    }

    /// Count `value` in every bucket whose bound is `>= value`. The last
    /// (`+Inf`) bucket always counts so it stays equal to the total count.
    pub(crate) fn observe(&self, bounds: &[f64], value: f64) {
        if let SeriesValue::Histogram(state) = &self.value {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            let last = bounds.len().saturating_sub(1);
            for (i, bound) in bounds.iter().enumerate() {
                if value <= *bound || i == last {
                    state.buckets[i] += 1;
                }
            }
            state.sum += value;
            state.count += 1;
        }
    }

    pub(crate) fn read(&self, bounds: &[f64]) -> Reading {
        match &self.value {
            SeriesValue::Scalar(v) => Reading::Scalar(v.load()),
            SeriesValue::Histogram(state) => {
                let state = state.lock().unwrap_or_else(PoisonError::into_inner);
                Reading::Histogram(HistogramReading {
                    buckets: bounds
                        .iter()
                        .copied()
                        .zip(state.buckets.iter().copied())
                        .collect(),
                    sum: state.sum,
                    count: state.count,
                })
            },
        }
    }
}

// ── Family ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct Family {
    desc: FamilyDesc,
    series: DashMap<Vec<String>, Arc<Series>>,
    next_seq: AtomicU64,
}

impl Family {
    fn new(desc: FamilyDesc) -> Self {
        Self {
            desc,
            series: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn desc(&self) -> &FamilyDesc {
        &self.desc
    }

    /// Get or create the series for `label_values`.
    pub(crate) fn series(&self, label_values: &[&str]) -> Result<Arc<Series>> {
        if label_values.len() != self.desc.label_names.len() {
            return Err(MetricsError::LabelArityMismatch {
                name: self.desc.name.clone(),
                expected: self.desc.label_names.len(),
                got: label_values.len(),
            });
        }
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_owned()).collect();
        if let Some(existing) = self.series.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        let values = key.clone();
        let entry = self.series.entry(key).or_insert_with(|| {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            Arc::new(Series::new(
                seq,
                values,
                self.desc.kind,
                self.desc.buckets.len(),
            ))
        });
        Ok(Arc::clone(entry.value()))
    }

    fn existing_series(&self, label_values: &[&str]) -> Result<Option<Arc<Series>>> {
        if label_values.len() != self.desc.label_names.len() {
            return Err(MetricsError::LabelArityMismatch {
                name: self.desc.name.clone(),
                expected: self.desc.label_names.len(),
                got: label_values.len(),
            });
        }
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_owned()).collect();
        Ok(self.series.get(&key).map(|s| Arc::clone(s.value())))
    }

    /// Series in creation order.
    pub(crate) fn series_in_order(&self) -> Vec<Arc<Series>> {
        let mut all: Vec<Arc<Series>> = self
            .series
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by_key(|s| s.seq);
        all
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// The metric registry. Share it behind an `Arc` with every writer and reader.
#[derive(Default)]
pub struct MetricStore {
    families: RwLock<BTreeMap<String, Arc<Family>>>,
    options: StoreOptions,
}

impl fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricStore")
            .field("families", &self.len())
            .field("options", &self.options)
            .finish()
    }
}

impl MetricStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            families: RwLock::default(),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Register a family. Re-registering an identical schema is a no-op.
    pub fn register(&self, desc: FamilyDesc) -> Result<()> {
        self.register_family(desc).map(|_| ())
    }

    pub(crate) fn register_family(&self, desc: FamilyDesc) -> Result<Arc<Family>> {
        let desc = desc.normalize()?;
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = families.get(&desc.name) {
            if existing.desc == desc {
                return Ok(Arc::clone(existing));
            }
            return Err(MetricsError::DuplicateName { name: desc.name });
        }
        let exposed = desc.exposed_names();
        if families
            .values()
            .any(|f| f.desc.exposed_names().iter().any(|n| exposed.contains(n)))
        {
            return Err(MetricsError::DuplicateName { name: desc.name });
        }

        let family = Arc::new(Family::new(desc));
        if family.desc.label_names.is_empty() {
            family.series(&[])?;
        }
        debug!(
            name = %family.desc.name,
            kind = %family.desc.kind,
            labels = family.desc.label_names.len(),
            "registered metric family"
        );
        families.insert(family.desc.name.clone(), Arc::clone(&family));
        Ok(family)
    }

    /// Add `delta` to a counter series. `delta` must be `>= 0`.
    pub fn increment(&self, name: &str, label_values: &[&str], delta: f64) -> Result<()> {
        let family = self.family(name, MetricKind::Counter)?;
        if delta.is_nan() || delta < 0.0 {
            return Err(MetricsError::InvalidDelta {
                name: name.to_owned(),
                delta,
            });
        }
        family.series(label_values)?.add(delta);
        Ok(())
    }

    /// Increment a counter series by one.
    pub fn inc(&self, name: &str, label_values: &[&str]) -> Result<()> {
        self.increment(name, label_values, 1.0)
    }

    pub fn set(&self, name: &str, label_values: &[&str], value: f64) -> Result<()> {
        self.family(name, MetricKind::Gauge)?
            .series(label_values)?
            .set(value);
        Ok(())
    }

    /// Set a gauge series to the current unix time in seconds.
    pub fn set_to_current_time(&self, name: &str, label_values: &[&str]) -> Result<()> {
        self.set(name, label_values, now_unix())
    }

    /// Add a signed `delta` to a gauge series.
    pub fn inc_dec(&self, name: &str, label_values: &[&str], delta: f64) -> Result<()> {
        self.family(name, MetricKind::Gauge)?
            .series(label_values)?
            .add(delta);
        Ok(())
    }

    pub fn observe(&self, name: &str, label_values: &[&str], value: f64) -> Result<()> {
        let family = self.family(name, MetricKind::Histogram)?;
        family
            .series(label_values)?
            .observe(&family.desc.buckets, value);
        Ok(())
    }

    /// Current value of one series, `None` if it was never touched.
    pub fn read(&self, name: &str, label_values: &[&str]) -> Result<Option<Reading>> {
        let family = self.lookup(name)?;
        Ok(family
            .existing_series(label_values)?
            .map(|series| series.read(&family.desc.buckets)))
    }

    /// Point-in-time copy of every family. Safe to call alongside writers.
    #[must_use]
    pub fn collect(&self) -> Snapshot {
        collector::snapshot(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    #[must_use]
    pub fn describe(&self, name: &str) -> Option<FamilyDesc> {
        self.lookup(name).ok().map(|f| f.desc.clone())
    }

    #[must_use]
    pub fn family_names(&self) -> Vec<String> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Families sorted by name. The registry lock is released before returning.
    pub(crate) fn families(&self) -> Vec<Arc<Family>> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<Family>> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| MetricsError::UnknownFamily {
                name: name.to_owned(),
            })
    }

    fn family(&self, name: &str, expected: MetricKind) -> Result<Arc<Family>> {
        let family = self.lookup(name)?;
        if family.desc.kind != expected {
            return Err(MetricsError::KindMismatch {
                name: name.to_owned(),
                expected,
                actual: family.desc.kind,
            });
        }
        Ok(family)
    }
}

pub(crate) fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(desc: FamilyDesc) -> MetricStore {
        let store = MetricStore::new();
        store.register(desc).unwrap();
        store
    }

    fn scalar(store: &MetricStore, name: &str, labels: &[&str]) -> f64 {
        match store.read(name, labels).unwrap() {
            Some(Reading::Scalar(v)) => v,
            other => panic!("expected scalar reading, got {other:?}"),
        }
    }

    fn histogram(store: &MetricStore, name: &str, labels: &[&str]) -> HistogramReading {
        match store.read(name, labels).unwrap() {
            Some(Reading::Histogram(h)) => h,
            other => panic!("expected histogram reading, got {other:?}"),
        }
    }

    #[test]
    fn counter_sums_deltas_per_label_combination() {
        let store = store_with(FamilyDesc::counter("msgs", "messages", &["bot_id"]));
        for delta in [1.0, 2.5, 0.0, 4.0] {
            store.increment("msgs", &["a"], delta).unwrap();
        }
        store.inc("msgs", &["b"]).unwrap();

        assert_eq!(scalar(&store, "msgs", &["a"]), 7.5);
        assert_eq!(scalar(&store, "msgs", &["b"]), 1.0);
        assert_eq!(store.read("msgs", &["c"]).unwrap(), None);
    }

    #[test]
    fn counter_rejects_negative_and_nan_delta() {
        let store = store_with(FamilyDesc::counter("msgs", "messages", &[]));
        assert!(matches!(
            store.increment("msgs", &[], -1.0),
            Err(MetricsError::InvalidDelta { .. })
        ));
        assert!(matches!(
            store.increment("msgs", &[], f64::NAN),
            Err(MetricsError::InvalidDelta { .. })
        ));
        assert_eq!(scalar(&store, "msgs", &[]), 0.0);
    }

    #[test]
    fn mutation_errors_are_reported() {
        let store = store_with(FamilyDesc::counter("msgs", "messages", &["bot_id", "adapter_name"]));

        assert!(matches!(
            store.inc("missing", &[]),
            Err(MetricsError::UnknownFamily { .. })
        ));
        assert_eq!(
            store.inc("msgs", &["only-one"]),
            Err(MetricsError::LabelArityMismatch {
                name: "msgs".into(),
                expected: 2,
                got: 1,
            })
        );
        assert!(matches!(
            store.set("msgs", &["a", "b"], 1.0),
            Err(MetricsError::KindMismatch {
                expected: MetricKind::Gauge,
                actual: MetricKind::Counter,
                ..
            })
        ));
    }

    #[test]
    fn gauge_set_and_inc_dec() {
        let store = store_with(FamilyDesc::gauge("bots", "bots", &["bot_id"]));
        store.inc_dec("bots", &["a"], 1.0).unwrap();
        store.inc_dec("bots", &["a"], 1.0).unwrap();
        store.inc_dec("bots", &["a"], -1.5).unwrap();
        assert_eq!(scalar(&store, "bots", &["a"]), 0.5);

        store.set("bots", &["a"], -3.0).unwrap();
        assert_eq!(scalar(&store, "bots", &["a"]), -3.0);
    }

    #[test]
    fn set_to_current_time_uses_unix_seconds() {
        let store = store_with(FamilyDesc::gauge("start", "start", &[]));
        let before = now_unix();
        store.set_to_current_time("start", &[]).unwrap();
        let value = scalar(&store, "start", &[]);
        assert!(value >= before);
        assert!(value <= now_unix());
    }

    #[test]
    fn histogram_observe_updates_buckets_sum_and_count() {
        let store = store_with(FamilyDesc::histogram("dur", "duration", &[], &[0.1, 1.0, 10.0]));
        store.observe("dur", &[], 0.5).unwrap();

        let h = histogram(&store, "dur", &[]);
        assert_eq!(h.buckets, vec![
            (0.1, 0),
            (1.0, 1),
            (10.0, 1),
            (f64::INFINITY, 1)
        ]);
        assert_eq!(h.count, 1);
        assert_eq!(h.sum, 0.5);

        store.observe("dur", &[], 0.1).unwrap();
        store.observe("dur", &[], 42.0).unwrap();
        let h = histogram(&store, "dur", &[]);
        assert_eq!(h.buckets, vec![
            (0.1, 1),
            (1.0, 2),
            (10.0, 2),
            (f64::INFINITY, 3)
        ]);
        assert_eq!(h.count, 3);
        assert!((h.sum - 42.6).abs() < 1e-9);
    }

    #[test]
    fn histogram_buckets_stay_monotonic() {
        let store = store_with(FamilyDesc::histogram("dur", "duration", &["k"], &[]));
        let values = [0.0, 0.004, 0.3, 7.7, 1e6, -2.0, 0.075, 10.0, 2.5];
        for v in values {
            store.observe("dur", &["x"], v).unwrap();
        }
        let h = histogram(&store, "dur", &["x"]);
        assert!(h.buckets.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(h.buckets.last().map(|b| b.1), Some(values.len() as u64));
        assert_eq!(h.count, values.len() as u64);
    }

    #[test]
    fn registration_is_idempotent_for_identical_schema() {
        let store = MetricStore::new();
        let desc = FamilyDesc::counter("msgs", "messages", &["bot_id"]);
        store.register(desc.clone()).unwrap();
        store.inc("msgs", &["a"]).unwrap();
        store.register(desc).unwrap();
        assert_eq!(scalar(&store, "msgs", &["a"]), 1.0);

        assert_eq!(
            store.register(FamilyDesc::counter("msgs", "other help", &["bot_id"])),
            Err(MetricsError::DuplicateName {
                name: "msgs".into()
            })
        );
        assert!(matches!(
            store.register(FamilyDesc::gauge("msgs", "messages", &["bot_id"])),
            Err(MetricsError::DuplicateName { .. })
        ));
    }

    #[test]
    fn colliding_sample_names_are_rejected() {
        let store = store_with(FamilyDesc::counter("msgs", "messages", &[]));
        assert_eq!(
            store.register(FamilyDesc::gauge("msgs_total", "messages", &[])),
            Err(MetricsError::DuplicateName {
                name: "msgs_total".into()
            })
        );
        assert!(matches!(
            store.register(FamilyDesc::gauge("msgs_created", "created", &[])),
            Err(MetricsError::DuplicateName { .. })
        ));

        store
            .register(FamilyDesc::histogram("h", "latency", &[], &[1.0]))
            .unwrap();
        assert!(matches!(
            store.register(FamilyDesc::gauge("h_count", "count", &[])),
            Err(MetricsError::DuplicateName { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::counter("h_sum", "sum", &[])),
            Err(MetricsError::DuplicateName { .. })
        ));

        assert!(!store.contains("msgs_total"));
        assert!(!store.contains("h_count"));
        assert!(store.register(FamilyDesc::gauge("msgs_count", "unrelated", &[])).is_ok());

        // Registered the other way around.
        let store = store_with(FamilyDesc::gauge("jobs_bucket", "jobs", &[]));
        assert!(matches!(
            store.register(FamilyDesc::histogram("jobs", "jobs", &[], &[])),
            Err(MetricsError::DuplicateName { .. })
        ));
        assert!(!store.contains("jobs"));
    }

    #[test]
    fn counter_total_suffix_is_stripped() {
        let store = store_with(FamilyDesc::counter("requests_total", "requests", &[]));
        assert!(store.contains("requests"));
        assert!(!store.contains("requests_total"));
    }

    #[test]
    fn unlabelled_families_start_with_one_series() {
        let store = store_with(FamilyDesc::counter("requests", "requests", &[]));
        assert_eq!(store.read("requests", &[]).unwrap(), Some(Reading::Scalar(0.0)));
    }

    #[test]
    fn invalid_descriptions_are_rejected() {
        let store = MetricStore::new();
        assert!(matches!(
            store.register(FamilyDesc::gauge("1bad", "", &[])),
            Err(MetricsError::InvalidName { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::gauge("ok", "", &["__reserved"])),
            Err(MetricsError::InvalidName { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::gauge("ok", "", &["a", "a"])),
            Err(MetricsError::InvalidName { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::histogram("h", "", &["le"], &[])),
            Err(MetricsError::InvalidName { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::histogram("h", "", &[], &[1.0, 0.5])),
            Err(MetricsError::InvalidBuckets { .. })
        ));
        assert!(matches!(
            store.register(FamilyDesc::histogram("h", "", &[], &[f64::NAN])),
            Err(MetricsError::InvalidBuckets { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_increments_lose_no_updates() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 10_000;

        let store = Arc::new(store_with(FamilyDesc::counter("hits", "hits", &["bot_id"])));
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.inc("hits", &["shared"]).unwrap();
                    }
                });
            }
        });

        assert_eq!(scalar(&store, "hits", &["shared"]), (THREADS * PER_THREAD) as f64);
    }

    #[test]
    fn concurrent_observe_and_collect_never_tear_histograms() {
        let store = Arc::new(store_with(FamilyDesc::histogram(
            "dur",
            "duration",
            &["worker"],
            &[0.5, 1.0],
        )));
        std::thread::scope(|s| {
            for worker in ["a", "b", "c", "d"] {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for i in 0..2_000 {
                        store.observe("dur", &[worker], f64::from(i % 3)).unwrap();
                    }
                });
            }
            let reader = Arc::clone(&store);
            s.spawn(move || {
                for _ in 0..200 {
                    let snapshot = reader.collect();
                    for family in &snapshot.families {
                        let buckets: Vec<f64> = family
                            .samples
                            .iter()
                            .filter(|s| s.name.ends_with("_bucket"))
                            .map(|s| s.value)
                            .collect();
                        for chunk in buckets.chunks(3) {
                            assert!(chunk.windows(2).all(|w| w[0] <= w[1]));
                        }
                    }
                }
            });
        });

        let h = histogram(&store, "dur", &["a"]);
        assert_eq!(h.count, 2_000);
    }
}
