//! Framework-level aggregates computed from a [`Snapshot`].
//!
//! Every function here is pure over its snapshot, so one collection answers
//! one question consistently.

use std::collections::HashMap;

use {
    pulse_metrics::{FamilySnapshot, Sample, Snapshot, framework, labels, suffixes},
    serde::Serialize,
    tracing::debug,
};

use crate::error::{QueryError, QueryResult};

/// Duration sums above one day are treated as corrupt and left out.
pub const MAX_DURATION_SUM_SECS: f64 = 86_400.0;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotPresence {
    Online,
    Offline,
}

impl BotPresence {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotInfo {
    pub bot_id: String,
    pub adapter: String,
    pub status: BotPresence,
    pub shutdown_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStatus {
    pub total_online: usize,
    /// Every bot ever seen, online or not, in connection order.
    pub bots: Vec<BotInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotMessageCount {
    pub bot_id: String,
    pub adapter: String,
    pub count: f64,
}

impl BotMessageCount {
    /// Display key, `bot_id(adapter)`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}({})", self.bot_id, self.adapter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageStats {
    pub total_received: f64,
    pub total_sent: f64,
    pub received_by_bot: Vec<BotMessageCount>,
    /// Summed over `user_id`.
    pub sent_by_bot: Vec<BotMessageCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatcherStat {
    pub plugin_id: String,
    pub matcher_name: String,
    pub call_count: f64,
    pub error_count: f64,
    pub total_duration: f64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatcherStats {
    pub total_matchers: usize,
    /// Sorted by call count, descending; ties keep first-seen order.
    pub top_matchers: Vec<MatcherStat>,
    /// Over all matchers, not only the listed ones.
    pub total_calls: f64,
    pub total_errors: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    /// Unix seconds; `None` when the start gauge was never set.
    pub started_at: Option<f64>,
    pub uptime_seconds: Option<u64>,
    pub metrics_requests: u64,
}

fn require<'a>(snapshot: &'a Snapshot, name: &str) -> QueryResult<&'a FamilySnapshot> {
    snapshot
        .family(name)
        .ok_or_else(|| QueryError::UnknownFamily(name.to_owned()))
}

fn totals(family: &FamilySnapshot) -> impl Iterator<Item = &Sample> {
    family
        .measurements()
        .filter(|s| s.name.ends_with(suffixes::TOTAL))
}

fn label_or_unknown<'a>(sample: &'a Sample, key: &str) -> &'a str {
    sample.label(key).unwrap_or(UNKNOWN)
}

fn bot_key(sample: &Sample) -> (String, String) {
    (
        label_or_unknown(sample, labels::BOT_ID).to_owned(),
        label_or_unknown(sample, labels::ADAPTER_NAME).to_owned(),
    )
}

pub fn bot_status(snapshot: &Snapshot) -> QueryResult<BotStatus> {
    let presence = require(snapshot, framework::BOTS_CONNECTED)?;
    let shutdowns = require(snapshot, framework::BOT_SHUTDOWN)?;

    let mut shutdown_counts: HashMap<(String, String), f64> = HashMap::new();
    for sample in totals(shutdowns) {
        *shutdown_counts.entry(bot_key(sample)).or_default() += sample.value;
    }

    let bots: Vec<BotInfo> = presence
        .measurements()
        .map(|sample| {
            let key = bot_key(sample);
            let shutdown_count = shutdown_counts.get(&key).copied().unwrap_or(0.0);
            let (bot_id, adapter) = key;
            BotInfo {
                bot_id,
                adapter,
                status: if sample.value > 0.0 {
                    BotPresence::Online
                } else {
                    BotPresence::Offline
                },
                shutdown_count,
            }
        })
        .collect();
    let total_online = bots
        .iter()
        .filter(|b| b.status == BotPresence::Online)
        .count();

    Ok(BotStatus { total_online, bots })
}

fn count_by_bot<'a>(samples: impl Iterator<Item = &'a Sample>) -> (f64, Vec<BotMessageCount>) {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut counts: Vec<BotMessageCount> = Vec::new();
    let mut total = 0.0;
    for sample in samples {
        total += sample.value;
        let key = bot_key(sample);
        match index.get(&key) {
            Some(&i) => counts[i].count += sample.value,
            None => {
                index.insert(key.clone(), counts.len());
                let (bot_id, adapter) = key;
                counts.push(BotMessageCount {
                    bot_id,
                    adapter,
                    count: sample.value,
                });
            },
        }
    }
    (total, counts)
}

pub fn message_stats(snapshot: &Snapshot) -> QueryResult<MessageStats> {
    let received = require(snapshot, framework::RECEIVED_MESSAGES)?;
    let sent = require(snapshot, framework::SENT_MESSAGES)?;

    let (total_received, received_by_bot) = count_by_bot(totals(received));
    let (total_sent, sent_by_bot) = count_by_bot(totals(sent));
    debug!(total_received, total_sent, "computed message stats");

    Ok(MessageStats {
        total_received,
        total_sent,
        received_by_bot,
        sent_by_bot,
    })
}

fn matcher_key(sample: &Sample) -> (String, String) {
    (
        label_or_unknown(sample, labels::PLUGIN_ID).to_owned(),
        label_or_unknown(sample, labels::MATCHER_NAME).to_owned(),
    )
}

/// Per-matcher call, error and duration figures, keeping the `limit` most
/// called matchers.
pub fn matcher_stats(snapshot: &Snapshot, limit: usize) -> QueryResult<MatcherStats> {
    let calls = require(snapshot, framework::MATCHER_CALLING)?;
    let durations = require(snapshot, framework::MATCHER_DURATION)?;

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut stats: Vec<MatcherStat> = Vec::new();
    for sample in totals(calls) {
        let raised = sample
            .label(labels::EXCEPTION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let key = matcher_key(sample);
        let i = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), stats.len());
                let (plugin_id, matcher_name) = key;
                stats.push(MatcherStat {
                    plugin_id,
                    matcher_name,
                    call_count: 0.0,
                    error_count: 0.0,
                    total_duration: 0.0,
                    avg_duration: 0.0,
                });
                stats.len() - 1
            },
        };
        stats[i].call_count += sample.value;
        if raised {
            stats[i].error_count += sample.value;
        }
    }

    for sample in durations
        .measurements()
        .filter(|s| s.name.ends_with(suffixes::SUM))
    {
        let key = matcher_key(sample);
        let Some(&i) = index.get(&key) else {
            continue;
        };
        if sample.value > MAX_DURATION_SUM_SECS {
            debug!(
                plugin_id = %key.0,
                matcher_name = %key.1,
                sum = sample.value,
                "discarding implausible matcher duration sum"
            );
            continue;
        }
        stats[i].total_duration += sample.value;
    }

    for stat in &mut stats {
        stat.avg_duration = if stat.call_count > 0.0 {
            stat.total_duration / stat.call_count
        } else {
            0.0
        };
    }
    stats.sort_by(|a, b| b.call_count.total_cmp(&a.call_count));

    let total_calls = stats.iter().map(|s| s.call_count).sum();
    let total_errors = stats.iter().map(|s| s.error_count).sum();
    let total_matchers = stats.len();
    stats.truncate(limit);

    Ok(MatcherStats {
        total_matchers,
        top_matchers: stats,
        total_calls,
        total_errors,
    })
}

/// Start time, uptime relative to `now` (unix seconds) and scrape count.
pub fn system_metrics(snapshot: &Snapshot, now: f64) -> QueryResult<SystemMetrics> {
    let start = require(snapshot, framework::START_AT)?;
    let requests = require(snapshot, framework::METRICS_REQUESTS)?;

    let started_at = start
        .measurements()
        .next()
        .map(|s| s.value)
        .filter(|v| *v > 0.0);
    let uptime_seconds = started_at.map(|t| (now - t).max(0.0) as u64);
    let metrics_requests = totals(requests).map(|s| s.value).sum::<f64>() as u64;

    Ok(SystemMetrics {
        started_at,
        uptime_seconds,
        metrics_requests,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        pulse_metrics::{FrameworkMetrics, MatcherRun, MetricStore, StoreOptions, suffixes},
        std::{sync::Arc, time::Duration},
    };

    fn framework_store() -> FrameworkMetrics {
        FrameworkMetrics::register(Arc::new(MetricStore::new())).unwrap()
    }

    fn run<'a>(plugin_id: &'a str, matcher_name: &'a str, exception: bool, millis: u64) -> MatcherRun<'a> {
        MatcherRun {
            plugin_id,
            matcher_name,
            exception,
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn bot_status_lists_online_and_offline_bots() {
        let fm = framework_store();
        fm.bot_connected("1", "OneBot V11").unwrap();
        fm.bot_connected("2", "Telegram").unwrap();
        fm.bot_disconnected("2", "Telegram").unwrap();
        fm.bot_connected("2", "Telegram").unwrap();
        fm.bot_disconnected("2", "Telegram").unwrap();

        let status = bot_status(&fm.store().collect()).unwrap();
        assert_eq!(status.total_online, 1);
        assert_eq!(status.bots.len(), 2);
        assert_eq!(status.bots[0].bot_id, "1");
        assert_eq!(status.bots[0].status, BotPresence::Online);
        assert_eq!(status.bots[0].shutdown_count, 0.0);
        assert_eq!(status.bots[1].status, BotPresence::Offline);
        assert_eq!(status.bots[1].shutdown_count, 2.0);
    }

    #[test]
    fn message_stats_sum_sent_over_users() {
        let fm = framework_store();
        for _ in 0..3 {
            fm.message_received("1", "Telegram").unwrap();
        }
        fm.message_received("2", "Discord").unwrap();
        fm.api_called("1", "Telegram", "send_message", Some("u1")).unwrap();
        fm.api_called("1", "Telegram", "send_message", Some("u2")).unwrap();
        fm.api_called("1", "Telegram", "get_me", None).unwrap();

        let stats = message_stats(&fm.store().collect()).unwrap();
        assert_eq!(stats.total_received, 4.0);
        assert_eq!(stats.total_sent, 2.0);
        assert_eq!(stats.received_by_bot.len(), 2);
        assert_eq!(stats.received_by_bot[0].key(), "1(Telegram)");
        assert_eq!(stats.received_by_bot[0].count, 3.0);
        assert_eq!(stats.sent_by_bot.len(), 1);
        assert_eq!(stats.sent_by_bot[0].count, 2.0);
    }

    #[test]
    fn matcher_stats_rank_and_total_over_all_matchers() {
        let fm = framework_store();
        for i in 0..10 {
            fm.matcher_finished(&run("p", "M1", i < 2, 100)).unwrap();
        }
        for _ in 0..20 {
            fm.matcher_finished(&run("p", "M2", false, 10)).unwrap();
        }

        let stats = matcher_stats(&fm.store().collect(), 1).unwrap();
        assert_eq!(stats.total_matchers, 2);
        assert_eq!(stats.top_matchers.len(), 1);
        assert_eq!(stats.top_matchers[0].matcher_name, "M2");
        assert_eq!(stats.total_calls, 30.0);
        assert_eq!(stats.total_errors, 2.0);

        let all = matcher_stats(&fm.store().collect(), 10).unwrap();
        let m1 = &all.top_matchers[1];
        assert_eq!(m1.call_count, 10.0);
        assert_eq!(m1.error_count, 2.0);
        assert!((m1.total_duration - 1.0).abs() < 1e-9);
        assert!((m1.avg_duration - 0.1).abs() < 1e-9);
    }

    #[test]
    fn matcher_ties_keep_first_seen_order() {
        let fm = framework_store();
        fm.matcher_finished(&run("p", "first", false, 1)).unwrap();
        fm.matcher_finished(&run("p", "second", false, 1)).unwrap();

        let stats = matcher_stats(&fm.store().collect(), 10).unwrap();
        let names: Vec<&str> = stats
            .top_matchers
            .iter()
            .map(|m| m.matcher_name.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn implausible_duration_sums_are_dropped() {
        let fm = framework_store();
        fm.matcher_finished(&run("p", "slow", false, 90_000_000)).unwrap();

        let stats = matcher_stats(&fm.store().collect(), 10).unwrap();
        assert_eq!(stats.top_matchers[0].call_count, 1.0);
        assert_eq!(stats.top_matchers[0].total_duration, 0.0);
        assert_eq!(stats.top_matchers[0].avg_duration, 0.0);
    }

    #[test]
    fn empty_store_yields_zeros() {
        let fm = framework_store();
        let snapshot = fm.store().collect();

        let stats = matcher_stats(&snapshot, 10).unwrap();
        assert_eq!(stats.total_matchers, 0);
        assert_eq!(stats.total_calls, 0.0);

        let system = system_metrics(&snapshot, 1_700_000_000.0).unwrap();
        assert_eq!(system.started_at, None);
        assert_eq!(system.uptime_seconds, None);
        assert_eq!(system.metrics_requests, 0);
    }

    #[test]
    fn system_metrics_measure_uptime_from_start_gauge() {
        let fm = framework_store();
        fm.store().set(framework::START_AT, &[], 1_000.0).unwrap();
        fm.metrics_requested().unwrap();

        let system = system_metrics(&fm.store().collect(), 4_661.5).unwrap();
        assert_eq!(system.started_at, Some(1_000.0));
        assert_eq!(system.uptime_seconds, Some(3_661));
        assert_eq!(system.metrics_requests, 1);
    }

    #[test]
    fn missing_families_are_reported() {
        let err = bot_status(&Snapshot::default()).unwrap_err();
        assert_eq!(err, QueryError::UnknownFamily(framework::BOTS_CONNECTED.to_owned()));
    }

    #[test]
    fn created_rows_do_not_change_aggregates() {
        let record = |emit_created: bool| {
            let store = Arc::new(MetricStore::with_options(StoreOptions { emit_created }));
            let fm = FrameworkMetrics::register(store).unwrap();
            fm.store().set(framework::START_AT, &[], 1_000.0).unwrap();
            fm.message_received("1", "Telegram").unwrap();
            fm.api_called("1", "Telegram", "send_message", Some("u1")).unwrap();
            fm.bot_connected("1", "Telegram").unwrap();
            fm.bot_disconnected("1", "Telegram").unwrap();
            fm.matcher_finished(&run("p", "M1", true, 250)).unwrap();
            fm.metrics_requested().unwrap();
            fm.store().collect()
        };
        let plain = record(false);
        let with_created = record(true);
        assert!(with_created
            .families
            .iter()
            .flat_map(|f| &f.samples)
            .any(|s| s.name.ends_with(suffixes::CREATED)));

        let messages = message_stats(&with_created).unwrap();
        assert_eq!(messages, message_stats(&plain).unwrap());
        assert_eq!(messages.total_received, 1.0);
        assert_eq!(messages.total_sent, 1.0);

        let matchers = matcher_stats(&with_created, 10).unwrap();
        assert_eq!(matchers, matcher_stats(&plain, 10).unwrap());
        assert_eq!(matchers.total_calls, 1.0);
        assert_eq!(matchers.total_errors, 1.0);
        assert!((matchers.top_matchers[0].total_duration - 0.25).abs() < 1e-9);

        let status = bot_status(&with_created).unwrap();
        assert_eq!(status, bot_status(&plain).unwrap());
        assert_eq!(status.bots[0].shutdown_count, 1.0);

        let system = system_metrics(&with_created, 2_000.0).unwrap();
        assert_eq!(system, system_metrics(&plain, 2_000.0).unwrap());
        assert_eq!(system.metrics_requests, 1);
        assert_eq!(system.uptime_seconds, Some(1_000));
    }
}
