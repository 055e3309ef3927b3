//! Command surface: one input line in, report texts out.
//!
//! | verb                    | reply                               |
//! |-------------------------|-------------------------------------|
//! | *(empty)*, `overview`   | overview                            |
//! | `status`, `bot`         | bot status                          |
//! | `messages`, `msg`       | message stats                       |
//! | `matchers`, `matcher`   | matcher stats                       |
//! | `system`, `sys`         | system metrics                      |
//! | `uptime`                | uptime                              |
//! | `query <expr>`          | name lookup or label-filtered values|
//! | `list`, `ls`            | all metrics                         |
//! | `search <keyword>`      | keyword search                      |
//! | `type <kind>`           | metrics of one kind                 |
//! | `help`, `h`, `?`        | help                                |
//!
//! Only the verb is case-insensitive. Anything else replies with an
//! unknown-argument line followed by the help text.

use std::str::FromStr;

use {pulse_metrics::MetricKind, tracing::debug};

use crate::{engine::QueryEngine, formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    /// Matchers listed by the `matchers` verb.
    pub matcher_limit: usize,
    /// Matchers aggregated for the overview.
    pub overview_matcher_limit: usize,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            matcher_limit: 10,
            overview_matcher_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Overview,
    Status,
    Messages,
    Matchers,
    System,
    Uptime,
    Help,
    Query(String),
    List,
    Search(String),
    Kind(String),
    Unknown(String),
}

impl Command {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (verb, rest) = match input.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (input, ""),
        };
        let verb = verb.to_lowercase();

        match (verb.as_str(), rest.is_empty()) {
            ("" | "overview", true) => Self::Overview,
            ("status" | "bot", true) => Self::Status,
            ("messages" | "msg", true) => Self::Messages,
            ("matchers" | "matcher", true) => Self::Matchers,
            ("system" | "sys", true) => Self::System,
            ("uptime", true) => Self::Uptime,
            ("help" | "h" | "?", true) => Self::Help,
            ("list" | "ls", true) => Self::List,
            ("query", false) => Self::Query(rest.to_owned()),
            ("search", false) => Self::Search(rest.to_owned()),
            ("type", false) => Self::Kind(rest.to_owned()),
            _ => Self::Unknown(input.to_owned()),
        }
    }
}

impl FromStr for Command {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Run one command and return the reply texts, in order.
pub fn execute(engine: &QueryEngine, command: &Command, options: &CommandOptions) -> Vec<String> {
    debug!(?command, "running metrics command");
    match command {
        Command::Overview => vec![formatter::format_overview(
            &engine.bot_status(),
            &engine.message_stats(),
            &engine.matcher_stats(options.overview_matcher_limit),
            &engine.system_metrics(),
        )],
        Command::Status => vec![formatter::format_bot_status(&engine.bot_status())],
        Command::Messages => vec![formatter::format_message_stats(&engine.message_stats())],
        Command::Matchers => vec![formatter::format_matcher_stats(
            &engine.matcher_stats(options.matcher_limit),
        )],
        Command::System => vec![formatter::format_system_metrics(&engine.system_metrics())],
        Command::Uptime => vec![formatter::format_uptime_report(&engine.system_metrics())],
        Command::Help => vec![formatter::format_help()],
        Command::Query(expr) => {
            let filter = engine.parse_filter_expression(expr);
            if filter.labels.is_empty() {
                vec![formatter::format_custom_metric(
                    &filter.name,
                    &engine.metrics_by_name(&filter.name),
                )]
            } else {
                vec![formatter::format_metric_values(
                    expr,
                    &engine.metric_values(&filter.name, &filter.labels),
                )]
            }
        },
        Command::List => vec![formatter::format_list_report(&engine.list_all())],
        Command::Search(keyword) => vec![formatter::format_search_report(
            keyword,
            &engine.search(keyword),
        )],
        Command::Kind(kind) => match kind.parse::<MetricKind>() {
            Ok(kind) => vec![formatter::format_kind_report(
                kind,
                &engine.metrics_by_kind(kind),
            )],
            Err(_) => vec![format!(
                "❌ Unknown metric type: {kind} (expected counter, gauge or histogram)"
            )],
        },
        Command::Unknown(arg) => vec![
            format!("❌ Unknown argument: {arg}"),
            formatter::format_help(),
        ],
    }
}

/// Parse and run `input`.
pub fn run(engine: &QueryEngine, input: &str, options: &CommandOptions) -> Vec<String> {
    execute(engine, &Command::parse(input), options)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        pulse_metrics::{FrameworkMetrics, MatcherRun, MetricStore},
        std::{sync::Arc, time::Duration},
    };

    fn setup() -> (FrameworkMetrics, QueryEngine) {
        let store = Arc::new(MetricStore::new());
        let fm = FrameworkMetrics::register(Arc::clone(&store)).unwrap();
        fm.mark_started().unwrap();
        (fm, QueryEngine::new(store))
    }

    #[test]
    fn verbs_and_aliases_parse() {
        assert_eq!(Command::parse(""), Command::Overview);
        assert_eq!(Command::parse("  STATUS "), Command::Status);
        assert_eq!(Command::parse("msg"), Command::Messages);
        assert_eq!(Command::parse("matcher"), Command::Matchers);
        assert_eq!(Command::parse("sys"), Command::System);
        assert_eq!(Command::parse("?"), Command::Help);
        assert_eq!(Command::parse("ls"), Command::List);
        assert_eq!(
            Command::parse("Query  Foo{Bot_Id=\"A\"}"),
            Command::Query("Foo{Bot_Id=\"A\"}".to_owned())
        );
        assert_eq!(Command::parse("type gauge"), Command::Kind("gauge".to_owned()));
    }

    #[test]
    fn verbs_missing_or_with_extra_arguments_are_unknown() {
        assert_eq!(Command::parse("query"), Command::Unknown("query".to_owned()));
        assert_eq!(
            Command::parse("status now"),
            Command::Unknown("status now".to_owned())
        );
        assert_eq!(Command::parse("frobnicate"), Command::Unknown("frobnicate".to_owned()));
    }

    #[test]
    fn unknown_argument_replies_then_shows_help() {
        let (_, engine) = setup();
        let replies = run(&engine, "frobnicate", &CommandOptions::default());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], "❌ Unknown argument: frobnicate");
        assert_eq!(replies[1], formatter::format_help());
    }

    #[test]
    fn overview_aggregates_current_state() {
        let (fm, engine) = setup();
        fm.bot_connected("1", "Telegram").unwrap();
        fm.message_received("1", "Telegram").unwrap();
        fm.matcher_finished(&MatcherRun {
            plugin_id: "echo",
            matcher_name: "echo.reply",
            exception: false,
            duration: Duration::from_millis(3),
        })
        .unwrap();

        let replies = run(&engine, "", &CommandOptions::default());
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("🤖 Bots: 1 online\n"));
        assert!(replies[0].contains("💬 Messages: 1 (in 1/out 0)\n"));
        assert!(replies[0].contains("🔍 Matchers: 1 calls (success rate 100.0%)\n"));
        assert!(replies[0].contains("⏱️ Uptime: 0:00:"));
    }

    #[test]
    fn matchers_verb_honours_limit() {
        let (fm, engine) = setup();
        for name in ["a", "b", "c"] {
            fm.matcher_finished(&MatcherRun {
                plugin_id: "p",
                matcher_name: name,
                exception: false,
                duration: Duration::from_millis(1),
            })
            .unwrap();
        }
        let options = CommandOptions {
            matcher_limit: 2,
            ..CommandOptions::default()
        };
        let replies = run(&engine, "matchers", &options);
        assert!(replies[0].contains("(3 matchers)"));
        assert!(replies[0].contains("🏆 Top 2 matchers:"));
    }

    #[test]
    fn query_with_labels_lists_values() {
        let (fm, engine) = setup();
        fm.message_received("1", "Telegram").unwrap();
        fm.message_received("2", "Telegram").unwrap();

        let replies = run(
            &engine,
            r#"query pulse_received_messages{bot_id="2"}"#,
            &CommandOptions::default(),
        );
        assert!(replies[0].starts_with("📊 Metric: pulse_received_messages{bot_id=\"2\"}\n"));
        assert!(replies[0].contains("adapter_name=\"Telegram\", bot_id=\"2\"\n      Value: 1\n"));
        assert!(!replies[0].contains("bot_id=\"1\""));
    }

    #[test]
    fn query_without_labels_describes_family() {
        let (_, engine) = setup();
        let replies = run(&engine, "query pulse_start_at", &CommandOptions::default());
        assert!(replies[0].contains("📋 Type: gauge\n"));
        assert!(replies[0].contains("   📌 (no labels)\n      pulse_start_at: "));
    }

    #[test]
    fn kind_verb_validates_kind() {
        let (_, engine) = setup();
        let replies = run(&engine, "type histogram", &CommandOptions::default());
        assert!(replies[0].contains("pulse_matcher_duration_seconds (histogram)"));

        let replies = run(&engine, "type summary", &CommandOptions::default());
        assert!(replies[0].starts_with("❌ Unknown metric type: summary"));
    }

    #[test]
    fn search_reports_empty_results() {
        let (_, engine) = setup();
        let replies = run(&engine, "search nothing-here", &CommandOptions::default());
        assert_eq!(replies, vec!["❌ No metrics matching 'nothing-here'".to_owned()]);
    }
}
