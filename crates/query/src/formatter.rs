//! Plain-text reports for query results.
//!
//! Every formatter accepts the `QueryResult` of its query and renders the
//! error variant as a single `failed:` line, so callers can always reply.

use {
    chrono::{DateTime, Local},
    pulse_metrics::{FamilySnapshot, MetricKind, Sample, suffixes},
};

use crate::{
    aggregate::{BotPresence, BotStatus, MatcherStats, MessageStats, SystemMetrics},
    error::{QueryError, QueryResult},
    registry::{LabeledValue, MetricInfo, MetricsByName},
};

const HELP_TRUNCATE: usize = 80;

fn rule(width: usize) -> String {
    "=".repeat(width)
}

fn failed(what: &str, err: &QueryError) -> String {
    format!("❌ {what} failed: {err}")
}

/// Abbreviate with K, M or B and one decimal; smaller values are rounded to
/// an integer.
#[must_use]
pub fn format_large_number(num: f64) -> String {
    if num == 0.0 {
        return "0".to_owned();
    }
    let abs = num.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.1}B", num / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.1}M", num / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", num / 1_000.0)
    } else {
        format!("{num:.0}")
    }
}

/// `part / whole` as a percentage with one decimal; `0.0%` when `whole` is 0.
#[must_use]
pub fn format_percent(part: f64, whole: f64) -> String {
    let pct = if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    };
    format!("{pct:.1}%")
}

/// `H:MM:SS`, prefixed with `N day(s), ` past one day.
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rem = seconds % 86_400;
    let clock = format!("{}:{:02}:{:02}", rem / 3_600, (rem % 3_600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

/// Local wall-clock time for a unix timestamp.
#[must_use]
pub fn format_timestamp(unix_seconds: f64) -> String {
    DateTime::from_timestamp(unix_seconds as i64, 0)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

fn format_labels(labels: &[(String, String)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_bot_status(status: &QueryResult<BotStatus>) -> String {
    let status = match status {
        Ok(status) => status,
        Err(e) => return failed("bot status", e),
    };
    if status.bots.is_empty() {
        return "🤖 No bots have connected yet".to_owned();
    }

    let mut out = format!("🤖 Bot status ({} online)\n", status.total_online);
    out.push_str(&rule(40));
    out.push('\n');
    for bot in &status.bots {
        let mark = match bot.status {
            BotPresence::Online => "✅",
            BotPresence::Offline => "❌",
        };
        out.push_str(&format!(
            "{mark} {} ({}) {}\n",
            bot.bot_id,
            bot.adapter,
            bot.status.as_str()
        ));
        out.push_str(&format!(
            "   Disconnects: {}\n",
            format_large_number(bot.shutdown_count)
        ));
    }
    out
}

pub fn format_message_stats(stats: &QueryResult<MessageStats>) -> String {
    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => return failed("message stats", e),
    };

    let mut out = String::from("📊 Message stats\n");
    out.push_str(&rule(40));
    out.push('\n');
    out.push_str(&format!(
        "📥 Received: {}\n",
        format_large_number(stats.total_received)
    ));
    out.push_str(&format!("📤 Sent: {}\n", format_large_number(stats.total_sent)));
    out.push_str(&format!(
        "📈 Total: {}\n",
        format_large_number(stats.total_received + stats.total_sent)
    ));

    for (title, rows) in [
        ("📥 Received per bot:", &stats.received_by_bot),
        ("📤 Sent per bot:", &stats.sent_by_bot),
    ] {
        if rows.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}\n"));
        for row in rows {
            out.push_str(&format!(
                "   {}: {}\n",
                row.key(),
                format_large_number(row.count)
            ));
        }
    }
    out
}

pub fn format_matcher_stats(stats: &QueryResult<MatcherStats>) -> String {
    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => return failed("matcher stats", e),
    };
    if stats.total_matchers == 0 {
        return "🔍 No matcher runs recorded yet".to_owned();
    }

    let mut out = format!("🔍 Matcher stats ({} matchers)\n", stats.total_matchers);
    out.push_str(&rule(40));
    out.push('\n');
    out.push_str(&format!("📞 Calls: {}\n", format_large_number(stats.total_calls)));
    out.push_str(&format!("❌ Errors: {}\n", format_large_number(stats.total_errors)));
    out.push_str(&format!(
        "✅ Success rate: {}\n",
        format_percent(stats.total_calls - stats.total_errors, stats.total_calls)
    ));

    if !stats.top_matchers.is_empty() {
        out.push_str(&format!("\n🏆 Top {} matchers:\n", stats.top_matchers.len()));
        for (i, m) in stats.top_matchers.iter().enumerate() {
            out.push_str(&format!("\n{}. {}\n", i + 1, m.matcher_name));
            out.push_str(&format!("   Plugin: {}\n", m.plugin_id));
            out.push_str(&format!("   Calls: {}\n", format_large_number(m.call_count)));
            out.push_str(&format!(
                "   Error rate: {}\n",
                format_percent(m.error_count, m.call_count)
            ));
            if m.avg_duration > 0.0 {
                out.push_str(&format!("   Avg duration: {:.3}s\n", m.avg_duration));
            }
        }
    }
    out
}

fn uptime_text(system: &SystemMetrics) -> String {
    system
        .uptime_seconds
        .map_or_else(|| "unknown".to_owned(), format_uptime)
}

pub fn format_system_metrics(system: &QueryResult<SystemMetrics>) -> String {
    let system = match system {
        Ok(system) => system,
        Err(e) => return failed("system metrics", e),
    };
    let started = system
        .started_at
        .map_or_else(|| "unknown".to_owned(), format_timestamp);

    let mut out = String::from("⚙️ System\n");
    out.push_str(&rule(40));
    out.push('\n');
    out.push_str(&format!("⏱️ Uptime: {}\n", uptime_text(system)));
    out.push_str(&format!("🚀 Started: {started}\n"));
    out.push_str(&format!("📊 Scrape requests: {}\n", system.metrics_requests));
    out
}

pub fn format_uptime_report(system: &QueryResult<SystemMetrics>) -> String {
    match system {
        Ok(system) => format!("⏱️ Uptime: {}", uptime_text(system)),
        Err(e) => failed("uptime", e),
    }
}

#[must_use]
pub fn format_help() -> String {
    let mut out = String::from("📋 Metrics query help\n");
    out.push_str(&rule(50));
    out.push_str("\n\n🔧 Commands:\n");
    for (usage, what) in [
        ("metrics", "overview"),
        ("metrics status", "bot status"),
        ("metrics messages", "message stats"),
        ("metrics matchers", "matcher stats"),
        ("metrics system", "system metrics"),
        ("metrics uptime", "uptime"),
        ("metrics query <name>", "look up a metric"),
        ("metrics list", "list all metrics"),
        ("metrics search <key>", "search metrics"),
        ("metrics type <kind>", "metrics of one kind"),
        ("metrics help", "this help"),
    ] {
        out.push_str(&format!("• {usage:<22} - {what}\n"));
    }
    out.push_str("\n💡 Examples:\n");
    for example in [
        "/metrics",
        "/metrics matchers",
        "/metrics query pulse_received_messages",
        "/metrics query pulse_received_messages{bot_id=\"42\"}",
        "/metrics search matcher",
        "/metrics type histogram",
    ] {
        out.push_str(&format!("• {example}\n"));
    }
    out
}

pub fn format_overview(
    bots: &QueryResult<BotStatus>,
    messages: &QueryResult<MessageStats>,
    matchers: &QueryResult<MatcherStats>,
    system: &QueryResult<SystemMetrics>,
) -> String {
    let mut out = String::from("📊 Metrics overview\n");
    out.push_str(&rule(50));
    out.push_str("\n\n");

    if let Ok(bots) = bots {
        out.push_str(&format!("🤖 Bots: {} online\n", bots.total_online));
    }
    if let Ok(m) = messages {
        out.push_str(&format!(
            "💬 Messages: {} (in {}/out {})\n",
            format_large_number(m.total_received + m.total_sent),
            format_large_number(m.total_received),
            format_large_number(m.total_sent),
        ));
    }
    if let Ok(m) = matchers {
        out.push_str(&format!(
            "🔍 Matchers: {} calls (success rate {})\n",
            format_large_number(m.total_calls),
            format_percent(m.total_calls - m.total_errors, m.total_calls),
        ));
    }
    if let Ok(system) = system {
        out.push_str(&format!("⏱️ Uptime: {}\n", uptime_text(system)));
    }

    out.push_str("\n💡 Send 'metrics help' for all commands");
    out
}

fn format_simple_samples(samples: &[Sample]) -> String {
    let mut groups: Vec<(&[(String, String)], Vec<&Sample>)> = Vec::new();
    for sample in samples {
        match groups.iter_mut().find(|(labels, _)| *labels == sample.labels.as_slice()) {
            Some((_, group)) => group.push(sample),
            None => groups.push((sample.labels.as_slice(), vec![sample])),
        }
    }

    let mut out = String::new();
    for (labels, group) in groups {
        if labels.is_empty() {
            out.push_str("   📌 (no labels)\n");
        } else {
            out.push_str(&format!("   📌 {}\n", format_labels(labels)));
        }
        for sample in group {
            out.push_str(&format!(
                "      {}: {}\n",
                sample.name,
                format_large_number(sample.value)
            ));
        }
    }
    out
}

fn format_histogram_samples(samples: &[Sample]) -> String {
    let mut sums = Vec::new();
    let mut counts = Vec::new();
    let mut buckets = Vec::new();
    let mut other = Vec::new();
    for sample in samples {
        if sample.name.ends_with(suffixes::SUM) {
            sums.push(sample);
        } else if sample.name.ends_with(suffixes::COUNT) {
            counts.push(sample);
        } else if sample.name.ends_with(suffixes::BUCKET) {
            buckets.push(sample);
        } else {
            other.push(sample);
        }
    }

    let mut out = String::new();
    push_section(&mut out, "📈 Sum:", &sums, |v| format!("{v:.6}"));
    push_section(&mut out, "🔢 Count:", &counts, format_large_number);
    push_section(&mut out, "🪣 Buckets:", &buckets, format_large_number);
    push_section(&mut out, "📋 Other:", &other, |v| v.to_string());
    out
}

fn push_section(out: &mut String, title: &str, rows: &[&Sample], value: fn(f64) -> String) {
    if rows.is_empty() {
        return;
    }
    out.push_str(&format!("   {title}\n"));
    for sample in rows {
        out.push_str(&format!(
            "      {}: {}\n",
            format_labels(&sample.labels),
            value(sample.value)
        ));
    }
}

fn format_family(family: &FamilySnapshot) -> String {
    let mut out = format!("📋 Type: {}\n", family.kind);
    out.push_str(&format!("📝 Help: {}\n", family.help));
    out.push_str(&format!("🔢 Samples: {}\n\n", family.samples.len()));
    match family.kind {
        MetricKind::Counter | MetricKind::Gauge => {
            out.push_str(&format_simple_samples(&family.samples));
        },
        MetricKind::Histogram => out.push_str(&format_histogram_samples(&family.samples)),
    }
    out
}

/// Report for a name lookup without label filters.
pub fn format_custom_metric(name: &str, result: &QueryResult<MetricsByName>) -> String {
    let found = match result {
        Ok(found) => found,
        Err(e) => return failed("metric query", e),
    };
    if found.families.is_empty() {
        return format!("❌ No metric found: {name}");
    }

    let mut out = format!("📊 Metric: {name}\n");
    out.push_str(&rule(50));
    out.push('\n');
    for family in &found.families {
        out.push_str(&format_family(family));
        out.push('\n');
        out.push_str(&"-".repeat(50));
        out.push('\n');
    }
    out
}

/// Report for a lookup with label filters; `query` is the expression as typed.
pub fn format_metric_values(query: &str, result: &QueryResult<Vec<LabeledValue>>) -> String {
    let values = match result {
        Ok(values) => values,
        Err(e) => return failed("metric query", e),
    };
    if values.is_empty() {
        return format!("❌ No matching samples: {query}");
    }

    let mut out = format!("📊 Metric: {query}\n");
    out.push_str(&rule(50));
    out.push('\n');
    for value in values {
        if value.labels.is_empty() {
            out.push_str("   📌 (no labels)\n");
        } else {
            out.push_str(&format!("   📌 {}\n", format_labels(&value.labels)));
        }
        out.push_str(&format!("      Value: {}\n", format_large_number(value.value)));
    }
    out
}

fn truncate_help(help: &str) -> String {
    if help.chars().count() > HELP_TRUNCATE {
        let head: String = help.chars().take(HELP_TRUNCATE).collect();
        format!("{head}...")
    } else {
        help.to_owned()
    }
}

pub fn format_metrics_list(metrics: &[MetricInfo], title: &str) -> String {
    if metrics.is_empty() {
        return "❌ No metrics found".to_owned();
    }

    let mut out = format!("{title}\n");
    out.push_str(&rule(50));
    out.push('\n');
    out.push_str(&format!("📊 {} metrics\n\n", metrics.len()));
    for info in metrics {
        out.push_str(&format!("🔸 {} ({})\n", info.name, info.kind));
        out.push_str(&format!("   📝 {}\n", truncate_help(&info.help)));
        out.push_str(&format!("   🔢 {} samples\n\n", info.sample_count));
    }
    out
}

pub fn format_list_report(result: &QueryResult<Vec<MetricInfo>>) -> String {
    match result {
        Ok(metrics) => format_metrics_list(metrics, "📋 Registered metrics"),
        Err(e) => failed("metric listing", e),
    }
}

pub fn format_search_report(keyword: &str, result: &QueryResult<Vec<MetricInfo>>) -> String {
    match result {
        Ok(metrics) if metrics.is_empty() => format!("❌ No metrics matching '{keyword}'"),
        Ok(metrics) => format_metrics_list(metrics, &format!("🔍 Search results: '{keyword}'")),
        Err(e) => failed("metric search", e),
    }
}

pub fn format_kind_report(kind: MetricKind, result: &QueryResult<Vec<FamilySnapshot>>) -> String {
    match result {
        Ok(families) => {
            let infos: Vec<MetricInfo> = families.iter().map(MetricInfo::from).collect();
            format_metrics_list(&infos, &format!("📋 {kind} metrics"))
        },
        Err(e) => failed("metric listing", e),
    }
}
