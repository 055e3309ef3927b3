use std::{
    any::Any,
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use {
    pulse_metrics::{FamilySnapshot, MetricKind, MetricStore, Snapshot},
    tracing::{error, warn},
};

use crate::{
    aggregate::{self, BotStatus, MatcherStats, MessageStats, SystemMetrics},
    error::{QueryError, QueryResult},
    filter::{self, FilterExpression},
    registry::{self, LabeledValue, MetricInfo, MetricsByName},
};

/// Read-only query surface over a shared [`MetricStore`].
///
/// Each query collects one snapshot and computes its answer from it. Failures
/// never escape as panics; they come back as [`QueryError`] values.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<MetricStore>,
    clock: fn() -> f64,
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic while evaluating metrics query".to_owned()
    }
}

impl QueryEngine {
    #[must_use]
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self::with_clock(store, unix_now)
    }

    /// Engine whose uptime figures use `clock` (unix seconds) as "now".
    #[must_use]
    pub fn with_clock(store: Arc<MetricStore>, clock: fn() -> f64) -> Self {
        Self { store, clock }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    fn run<T>(
        &self,
        query: &'static str,
        f: impl FnOnce(&Snapshot) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let snapshot = self.store.collect();
            f(&snapshot)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(QueryError::StoreFault(panic_message(payload.as_ref()))),
        };
        match &result {
            Err(e @ QueryError::StoreFault(_)) => error!(query, error = %e, "metrics query failed"),
            Err(e) => warn!(query, error = %e, "metrics query failed"),
            Ok(_) => {},
        }
        result
    }

    pub fn snapshot(&self) -> QueryResult<Snapshot> {
        self.run("snapshot", |snapshot| Ok(snapshot.clone()))
    }

    pub fn bot_status(&self) -> QueryResult<BotStatus> {
        self.run("bot_status", aggregate::bot_status)
    }

    pub fn message_stats(&self) -> QueryResult<MessageStats> {
        self.run("message_stats", aggregate::message_stats)
    }

    pub fn matcher_stats(&self, limit: usize) -> QueryResult<MatcherStats> {
        self.run("matcher_stats", |snapshot| {
            aggregate::matcher_stats(snapshot, limit)
        })
    }

    pub fn system_metrics(&self) -> QueryResult<SystemMetrics> {
        let now = (self.clock)();
        self.run("system_metrics", |snapshot| {
            aggregate::system_metrics(snapshot, now)
        })
    }

    pub fn metrics_by_name(&self, name: &str) -> QueryResult<MetricsByName> {
        self.run("metrics_by_name", |snapshot| {
            Ok(registry::metrics_by_name(snapshot, name))
        })
    }

    pub fn metrics_by_kind(&self, kind: MetricKind) -> QueryResult<Vec<FamilySnapshot>> {
        self.run("metrics_by_kind", |snapshot| {
            Ok(registry::metrics_by_kind(snapshot, kind))
        })
    }

    pub fn metric_values(
        &self,
        name: &str,
        filter: &BTreeMap<String, String>,
    ) -> QueryResult<Vec<LabeledValue>> {
        self.run("metric_values", |snapshot| {
            Ok(registry::metric_values(snapshot, name, filter))
        })
    }

    pub fn list_all(&self) -> QueryResult<Vec<MetricInfo>> {
        self.run("list_all", |snapshot| Ok(registry::list_all(snapshot)))
    }

    pub fn search(&self, keyword: &str) -> QueryResult<Vec<MetricInfo>> {
        self.run("search", |snapshot| Ok(registry::search(snapshot, keyword)))
    }

    #[must_use]
    pub fn parse_filter_expression(&self, query: &str) -> FilterExpression {
        filter::parse_filter_expression(query)
    }
}
