//! Metric registry, collection and export for pulse.
//!
//! This crate holds a label-keyed registry of counters, gauges and histograms
//! ([`MetricStore`]), turns it into point-in-time [`Snapshot`]s, and renders
//! snapshots in the Prometheus text exposition format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pulse_metrics::{FamilyDesc, MetricStore, exposition};
//!
//! let store = Arc::new(MetricStore::new());
//! store.register(FamilyDesc::counter("http_requests", "Requests", &["endpoint"]))?;
//! store.inc("http_requests", &["/api/chat"])?;
//! let text = exposition::render(&store.collect());
//! ```
//!
//! The store is an explicit instance shared by `Arc`; there is no hidden
//! global registry. [`recorder::StoreRecorder`] can optionally be installed
//! behind the `metrics` facade.

mod collector;
pub mod definitions;
mod error;
pub mod exposition;
mod instruments;
pub mod recorder;
mod snapshot;
mod store;

pub use {
    collector::snapshot,
    definitions::*,
    error::{MetricsError, Result},
    instruments::{FrameworkMetrics, MatcherRun, SEND_MESSAGE_APIS},
    recorder::{MetricsHandle, MetricsRecorderConfig, StoreRecorder, init_metrics},
    snapshot::{FamilySnapshot, Sample, Snapshot},
    store::{FamilyDesc, HistogramReading, MetricKind, MetricStore, Reading, StoreOptions},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
