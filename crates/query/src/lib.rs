//! Queries over pulse metric snapshots and their text reports.
//!
//! [`QueryEngine`] answers the questions a bot operator asks from chat (which
//! bots are online, how many messages went through, which matchers are hot,
//! how long the process has been up) plus name, label and keyword lookups
//! over the registry. [`formatter`] renders every result, including the
//! error-tagged ones, and [`commands`] maps command verbs onto both.

pub mod aggregate;
pub mod commands;
mod engine;
mod error;
pub mod filter;
pub mod formatter;
pub mod registry;

pub use {
    aggregate::{
        BotInfo, BotMessageCount, BotPresence, BotStatus, MatcherStat, MatcherStats,
        MessageStats, SystemMetrics,
    },
    commands::{Command, CommandOptions},
    engine::QueryEngine,
    error::{QueryError, QueryResult},
    filter::{FilterExpression, parse_filter_expression},
    registry::{LabeledValue, MetricInfo, MetricsByName},
};
