//! Prometheus text exposition format (version 0.0.4).
//!
//! [`render`] serializes a [`Snapshot`] for scraping; [`parse`] reads the same
//! format back into a [`Snapshot`].
//!
//! Counter families are announced under their exposed `<name>_total` name.
//! `_created` rows, when present, are written as a separate gauge block named
//! `<name>_created`, as the reference client library does.

use std::collections::HashMap;

use crate::{
    definitions::suffixes,
    snapshot::{FamilySnapshot, Sample, Snapshot},
    store::MetricKind,
};

/// `Content-Type` for scrape responses.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render `snapshot` in text exposition format. Output is byte-stable for a
/// given snapshot.
#[must_use]
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for family in &snapshot.families {
        let header = match family.kind {
            MetricKind::Counter => format!("{}{}", family.name, suffixes::TOTAL),
            MetricKind::Gauge | MetricKind::Histogram => family.name.clone(),
        };
        write_header(&mut out, &header, &family.help, family.kind.as_str());

        let (created, measured): (Vec<&Sample>, Vec<&Sample>) =
            family.samples.iter().partition(|s| s.is_created());
        for sample in measured {
            write_sample(&mut out, sample);
        }
        if !created.is_empty() {
            let created_name = format!("{}{}", family.name, suffixes::CREATED);
            write_header(&mut out, &created_name, &family.help, MetricKind::Gauge.as_str());
            for sample in created {
                write_sample(&mut out, sample);
            }
        }
    }
    out
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {name} {}\n", escape_help(help)));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
}

fn write_sample(out: &mut String, sample: &Sample) {
    out.push_str(&sample.name);
    if !sample.labels.is_empty() {
        let mut labels: Vec<&(String, String)> = sample.labels.iter().collect();
        labels.sort_by(|a, b| a.0.cmp(&b.0));
        let rendered: Vec<String> = labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
            .collect();
        out.push('{');
        out.push_str(&rendered.join(","));
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_float(sample.value));
    if let Some(ts) = sample.timestamp {
        out.push_str(&format!(" {ts}"));
    }
    out.push('\n');
}

fn escape_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    for c in help.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

/// Format a sample value or bucket bound: `+Inf`, `-Inf`, `NaN`, and whole
/// numbers with one decimal (`2.0`), as the reference client does.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "+Inf".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn parse_float(token: &str) -> Option<f64> {
    match token {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => token.parse().ok(),
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: unsupported metric type '{kind}'")]
    UnsupportedType { line: usize, kind: String },
}

/// Parse text exposition output back into a [`Snapshot`].
///
/// Samples are attached to the family announced by the closest preceding
/// `# TYPE` line. A `<name>_created` gauge block following a counter or
/// histogram family is folded back into that family.
pub fn parse(text: &str) -> Result<Snapshot, ParseError> {
    let mut families: Vec<FamilySnapshot> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut helps: HashMap<String, String> = HashMap::new();
    let mut current: Option<usize> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("# HELP ") {
            let (name, help) = rest.split_once(' ').unwrap_or((rest, ""));
            helps.insert(name.to_owned(), unescape_help(help));
            continue;
        }

        if let Some(rest) = line.strip_prefix("# TYPE ") {
            let (name, kind) = rest.split_once(' ').ok_or_else(|| ParseError::Malformed {
                line: line_no,
                reason: "TYPE line without a type".into(),
            })?;
            let kind_token = kind.trim();
            let kind: MetricKind =
                kind_token
                    .parse()
                    .map_err(|_| ParseError::UnsupportedType {
                        line: line_no,
                        kind: kind_token.to_owned(),
                    })?;

            if kind == MetricKind::Gauge
                && let Some(base) = name.strip_suffix(suffixes::CREATED)
                && let Some(&idx) = index.get(base)
                && families[idx].kind != MetricKind::Gauge
            {
                current = Some(idx);
                continue;
            }

            let base = match kind {
                MetricKind::Counter => name.strip_suffix(suffixes::TOTAL).unwrap_or(name),
                MetricKind::Gauge | MetricKind::Histogram => name,
            };
            let idx = match index.get(base) {
                Some(&idx) => idx,
                None => {
                    let help = helps
                        .get(name)
                        .or_else(|| helps.get(base))
                        .cloned()
                        .unwrap_or_default();
                    families.push(FamilySnapshot {
                        name: base.to_owned(),
                        kind,
                        help,
                        samples: Vec::new(),
                    });
                    index.insert(base.to_owned(), families.len() - 1);
                    families.len() - 1
                },
            };
            current = Some(idx);
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let sample = parse_sample(line).map_err(|reason| ParseError::Malformed {
            line: line_no,
            reason,
        })?;
        match current {
            Some(idx) if belongs_to(&families[idx], &sample.name) => {
                families[idx].samples.push(sample);
            },
            _ => {
                return Err(ParseError::Malformed {
                    line: line_no,
                    reason: format!(
                        "sample '{}' does not belong to a declared family",
                        sample.name
                    ),
                });
            },
        }
    }

    families.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Snapshot { families })
}

fn belongs_to(family: &FamilySnapshot, sample_name: &str) -> bool {
    let Some(suffix) = sample_name.strip_prefix(family.name.as_str()) else {
        return false;
    };
    match family.kind {
        MetricKind::Counter => matches!(suffix, "" | suffixes::TOTAL | suffixes::CREATED),
        MetricKind::Gauge => suffix.is_empty(),
        MetricKind::Histogram => matches!(
            suffix,
            suffixes::BUCKET | suffixes::SUM | suffixes::COUNT | suffixes::CREATED
        ),
    }
}

fn parse_sample(line: &str) -> Result<Sample, String> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .ok_or_else(|| "sample without a value".to_owned())?;
    let name = &line[..name_end];
    if name.is_empty() {
        return Err("sample without a metric name".into());
    }

    let mut rest = &line[name_end..];
    let mut labels = Vec::new();
    if let Some(label_text) = rest.strip_prefix('{') {
        let (parsed, remaining) = parse_labels(label_text)?;
        labels = parsed;
        rest = remaining;
    }

    let mut fields = rest.split_whitespace();
    let value_token = fields.next().ok_or_else(|| "sample without a value".to_owned())?;
    let value = parse_float(value_token).ok_or_else(|| format!("invalid value '{value_token}'"))?;
    let timestamp = fields
        .next()
        .map(|t| {
            t.parse::<i64>()
                .map_err(|_| format!("invalid timestamp '{t}'"))
        })
        .transpose()?;
    if fields.next().is_some() {
        return Err("unexpected trailing fields".into());
    }

    let mut sample = Sample::new(name, labels, value);
    sample.timestamp = timestamp;
    Ok(sample)
}

/// Parse `k="v",...}` and return the labels plus the text after `}`.
fn parse_labels(input: &str) -> Result<(Vec<(String, String)>, &str), String> {
    let mut labels = Vec::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while chars
            .peek()
            .is_some_and(|(_, c)| *c == ',' || c.is_whitespace())
        {
            chars.next();
        }
        let Some((start, first)) = chars.next() else {
            return Err("unterminated label set".into());
        };
        if first == '}' {
            return Ok((labels, &input[start + 1..]));
        }

        let mut key = String::from(first);
        loop {
            match chars.next() {
                Some((_, '=')) => break,
                Some((_, c)) => key.push(c),
                None => return Err("unterminated label set".into()),
            }
        }
        let key = key.trim().to_owned();
        if !matches!(chars.next(), Some((_, '"'))) {
            return Err(format!("value of label '{key}' is not quoted"));
        }

        let mut value = String::new();
        loop {
            match chars.next() {
                Some((_, '"')) => break,
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err("unterminated escape in label value".into()),
                },
                Some((_, c)) => value.push(c),
                None => return Err(format!("unterminated value for label '{key}'")),
            }
        }
        labels.push((key, value));
    }
}

fn unescape_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    let mut chars = help.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
