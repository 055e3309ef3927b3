//! Bridge between the `metrics` facade and [`MetricStore`].
//!
//! Installing a [`StoreRecorder`] lets code record through the facade macros:
//!
//! ```rust,ignore
//! use pulse_metrics::{counter, definitions::framework};
//!
//! counter!(framework::RECEIVED_MESSAGES, "bot_id" => "42", "adapter_name" => "Telegram")
//!     .increment(1);
//! ```
//!
//! Facade keys are matched to a family's label schema by label name.
//! Unknown names are registered on first use, with the key's label names in
//! the order given and any description passed to `describe_*`. A family's
//! help is fixed at registration, so `describe_*` must come before the first
//! use of a name; later descriptions are dropped.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use {
    metrics::{
        Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata,
        Recorder, SharedString, Unit,
    },
    tracing::{debug, info, warn},
};

use crate::{
    definitions::suffixes,
    error::{MetricsError, Result},
    exposition,
    instruments::FrameworkMetrics,
    snapshot::Snapshot,
    store::{Family, FamilyDesc, MetricKind, MetricStore, Series, StoreOptions},
};

/// `metrics::Recorder` backed by a shared [`MetricStore`].
#[derive(Debug)]
pub struct StoreRecorder {
    store: Arc<MetricStore>,
    descriptions: Mutex<HashMap<String, String>>,
}

impl StoreRecorder {
    #[must_use]
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self {
            store,
            descriptions: Mutex::new(HashMap::new()),
        }
    }

    fn describe(&self, kind: MetricKind, key: KeyName, description: SharedString) {
        let name = canonical_name(kind, key.as_str());
        if self.store.contains(name) {
            debug!(metric = name, "metric already registered, description ignored");
            return;
        }
        self.descriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), String::from(&*description));
    }

    fn family_for(&self, key: &Key, kind: MetricKind) -> Result<Arc<Family>> {
        let name = key.name();
        let canonical = canonical_name(kind, name);
        let family = match self.store.lookup(canonical) {
            Ok(family) => family,
            Err(MetricsError::UnknownFamily { .. }) => {
                let help = self
                    .descriptions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(canonical)
                    .unwrap_or_default();
                let label_names: Vec<&str> = key.labels().map(|l| l.key()).collect();
                let desc = match kind {
                    MetricKind::Counter => FamilyDesc::counter(name, help, &label_names),
                    MetricKind::Gauge => FamilyDesc::gauge(name, help, &label_names),
                    MetricKind::Histogram => {
                        FamilyDesc::histogram(name, help, &label_names, &[])
                    },
                };
                self.store.register_family(desc)?
            },
            Err(e) => return Err(e),
        };

        if family.desc().kind != kind {
            return Err(MetricsError::KindMismatch {
                name: name.to_owned(),
                expected: kind,
                actual: family.desc().kind,
            });
        }
        Ok(family)
    }

    #[cfg(test)]
    fn pending_descriptions(&self) -> usize {
        self.descriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn series_for(&self, key: &Key, kind: MetricKind) -> Result<(Arc<Family>, Arc<Series>)> {
        let family = self.family_for(key, kind)?;
        let label_names = &family.desc().label_names;
        let arity = MetricsError::LabelArityMismatch {
            name: family.desc().name.clone(),
            expected: label_names.len(),
            got: key.labels().len(),
        };
        if key.labels().len() != label_names.len() {
            return Err(arity);
        }
        let values = label_names
            .iter()
            .map(|label| {
                key.labels()
                    .find(|l| l.key() == label.as_str())
                    .map(|l| l.value())
                    .ok_or_else(|| arity.clone())
            })
            .collect::<Result<Vec<&str>>>()?;
        let series = family.series(&values)?;
        Ok((family, series))
    }
}

/// Name a facade key resolves to in the store. Counters drop `_total`.
fn canonical_name(kind: MetricKind, name: &str) -> &str {
    match kind {
        MetricKind::Counter => name
            .strip_suffix(suffixes::TOTAL)
            .filter(|s| !s.is_empty())
            .unwrap_or(name),
        MetricKind::Gauge | MetricKind::Histogram => name,
    }
}

struct CounterHandle(Arc<Series>);

impl CounterFn for CounterHandle {
    fn increment(&self, value: u64) {
        self.0.add(value as f64);
    }

    fn absolute(&self, value: u64) {
        self.0.raise_to(value as f64);
    }
}

struct GaugeHandle(Arc<Series>);

impl GaugeFn for GaugeHandle {
    fn increment(&self, value: f64) {
        self.0.add(value);
    }

    fn decrement(&self, value: f64) {
        self.0.add(-value);
    }

    fn set(&self, value: f64) {
        self.0.set(value);
    }
}

struct HistogramHandle {
    series: Arc<Series>,
    bounds: Arc<[f64]>,
}

impl HistogramFn for HistogramHandle {
    fn record(&self, value: f64) {
        self.series.observe(&self.bounds, value);
    }
}

impl Recorder for StoreRecorder {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(MetricKind::Counter, key, description);
    }

    fn describe_gauge(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(MetricKind::Gauge, key, description);
    }

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(MetricKind::Histogram, key, description);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        match self.series_for(key, MetricKind::Counter) {
            Ok((_, series)) => Counter::from_arc(Arc::new(CounterHandle(series))),
            Err(e) => {
                warn!(error = %e, "dropping counter registered through metrics facade");
                Counter::noop()
            },
        }
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        match self.series_for(key, MetricKind::Gauge) {
            Ok((_, series)) => Gauge::from_arc(Arc::new(GaugeHandle(series))),
            Err(e) => {
                warn!(error = %e, "dropping gauge registered through metrics facade");
                Gauge::noop()
            },
        }
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        match self.series_for(key, MetricKind::Histogram) {
            Ok((family, series)) => Histogram::from_arc(Arc::new(HistogramHandle {
                series,
                bounds: family.desc().buckets.clone().into(),
            })),
            Err(e) => {
                warn!(error = %e, "dropping histogram registered through metrics facade");
                Histogram::noop()
            },
        }
    }
}

/// Metrics recorder configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Install the store as the process-wide `metrics` recorder.
    pub install_global: bool,
    pub options: StoreOptions,
}

/// Shared access to an initialized store and its framework instruments.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    store: Arc<MetricStore>,
    framework: FrameworkMetrics,
}

impl MetricsHandle {
    #[must_use]
    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    #[must_use]
    pub fn framework(&self) -> &FrameworkMetrics {
        &self.framework
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.collect()
    }

    /// Render the current state in text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        exposition::render(&self.store.collect())
    }
}

/// Build a store, register the framework families, mark the start time,
/// and optionally install the store behind the `metrics` facade.
pub fn init_metrics(config: MetricsRecorderConfig) -> anyhow::Result<MetricsHandle> {
    let store = Arc::new(MetricStore::with_options(config.options));
    let framework = FrameworkMetrics::register(Arc::clone(&store))?;
    framework.mark_started()?;

    if config.install_global {
        let recorder = StoreRecorder::new(Arc::clone(&store));
        if metrics::set_global_recorder(recorder).is_err() {
            anyhow::bail!("a global metrics recorder is already installed");
        }
        info!("installed metrics facade recorder");
    }

    Ok(MetricsHandle { store, framework })
}
