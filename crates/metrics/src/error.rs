use crate::store::MetricKind;

/// Errors raised by registration and mutation of metric families.
///
/// Mutation errors indicate a wiring bug in the instrumented code and are
/// meant to be propagated, not swallowed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("unknown metric family '{name}'")]
    UnknownFamily { name: String },

    #[error("metric '{name}' expects {expected} label values, got {got}")]
    LabelArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("counter '{name}' cannot be incremented by negative delta {delta}")]
    InvalidDelta { name: String, delta: f64 },

    #[error("metric '{name}' is already registered with a different schema")]
    DuplicateName { name: String },

    #[error("metric '{name}' is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("invalid metric or label name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid buckets for histogram '{name}': {reason}")]
    InvalidBuckets { name: String, reason: &'static str },
}

pub type Result<T, E = MetricsError> = std::result::Result<T, E>;
