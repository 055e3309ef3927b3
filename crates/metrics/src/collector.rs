//! Walks a [`MetricStore`] and expands every series into exposed sample rows.
//!
//! Counters expose `<name>_total`, gauges expose `<name>`, and histograms
//! expose one `<name>_bucket{le="..."}` row per bound (ascending, ending with
//! `+Inf`) followed by `<name>_sum` and `<name>_count`. With
//! [`StoreOptions::emit_created`](crate::StoreOptions) set, counters and
//! histograms also get a `<name>_created` row.

use crate::{
    definitions::{labels, suffixes},
    exposition::format_float,
    snapshot::{FamilySnapshot, Sample, Snapshot},
    store::{Family, MetricKind, MetricStore, Reading},
};

/// Copy the current state of `store`.
///
/// Each series is read atomically; series read at different moments may
/// straddle concurrent writes.
#[must_use]
pub fn snapshot(store: &MetricStore) -> Snapshot {
    let emit_created = store.options().emit_created;
    Snapshot {
        families: store
            .families()
            .iter()
            .map(|family| collect_family(family, emit_created))
            .collect(),
    }
}

fn collect_family(family: &Family, emit_created: bool) -> FamilySnapshot {
    let desc = family.desc();
    let mut samples = Vec::new();

    for series in family.series_in_order() {
        let base: Vec<(String, String)> = desc
            .label_names
            .iter()
            .cloned()
            .zip(series.label_values().iter().cloned())
            .collect();

        match series.read(&desc.buckets) {
            Reading::Scalar(value) => {
                let name = match desc.kind {
                    MetricKind::Counter => format!("{}{}", desc.name, suffixes::TOTAL),
                    MetricKind::Gauge | MetricKind::Histogram => desc.name.clone(),
                };
                samples.push(Sample::new(name, base.clone(), value));
            },
            Reading::Histogram(histogram) => {
                let bucket_name = format!("{}{}", desc.name, suffixes::BUCKET);
                for (bound, count) in &histogram.buckets {
                    let mut labeled = base.clone();
                    labeled.push((labels::LE.to_owned(), format_float(*bound)));
                    samples.push(Sample::new(bucket_name.clone(), labeled, *count as f64));
                }
                samples.push(Sample::new(
                    format!("{}{}", desc.name, suffixes::SUM),
                    base.clone(),
                    histogram.sum,
                ));
                samples.push(Sample::new(
                    format!("{}{}", desc.name, suffixes::COUNT),
                    base.clone(),
                    histogram.count as f64,
                ));
            },
        }

        if emit_created && desc.kind != MetricKind::Gauge {
            samples.push(Sample::new(
                format!("{}{}", desc.name, suffixes::CREATED),
                base,
                series.created(),
            ));
        }
    }

    FamilySnapshot {
        name: desc.name.clone(),
        kind: desc.kind,
        help: desc.help.clone(),
        samples,
    }
}
