/// Errors surfaced by query entry points as error-tagged results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("metric family '{0}' is not registered")]
    UnknownFamily(String),

    /// Never leaves `parse_filter_expression`, which degrades to a bare name.
    #[error("malformed filter expression: {0}")]
    MalformedFilter(String),

    #[error("internal fault: {0}")]
    StoreFault(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
