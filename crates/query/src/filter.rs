//! `name{label="value",...}` filter expressions.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl FilterExpression {
    fn bare(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            labels: BTreeMap::new(),
        }
    }
}

/// Parse a filter expression. Input that does not parse is treated as a bare
/// metric name, so the result is always usable as a lookup.
#[must_use]
pub fn parse_filter_expression(query: &str) -> FilterExpression {
    let query = query.trim();
    match try_parse(query) {
        Ok(expr) => expr,
        Err(e) => {
            debug!(query, error = %e, "treating filter expression as a bare name");
            FilterExpression::bare(query)
        },
    }
}

fn try_parse(query: &str) -> QueryResult<FilterExpression> {
    let Some((name, rest)) = query.split_once('{') else {
        return Ok(FilterExpression::bare(query));
    };
    let body = rest
        .strip_suffix('}')
        .ok_or_else(|| QueryError::MalformedFilter("missing closing brace".into()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(QueryError::MalformedFilter("missing metric name".into()));
    }

    let mut labels = BTreeMap::new();
    for pair in split_pairs(body)? {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            return Err(QueryError::MalformedFilter(format!(
                "expected key=value, got '{pair}'"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(QueryError::MalformedFilter("empty label name".into()));
        }
        labels.insert(key.to_owned(), unquote(value.trim()));
    }

    Ok(FilterExpression {
        name: name.to_owned(),
        labels,
    })
}

/// A value wrapped in matching quotes is unescaped the way exposition label
/// values are escaped. Anything else only loses stray quote characters.
fn unquote(value: &str) -> String {
    for q in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
        {
            return unescape(inner);
        }
    }
    value.trim_matches(|c| c == '"' || c == '\'').to_owned()
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
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

/// Split on commas that sit outside quoted values. Inside quotes a backslash
/// escapes the next character.
fn split_pairs(body: &str) -> QueryResult<Vec<&str>> {
    let mut pairs = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ',') => {
                pairs.push(&body[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    if quote.is_some() {
        return Err(QueryError::MalformedFilter("unterminated quote".into()));
    }
    pairs.push(&body[start..]);
    Ok(pairs)
}
