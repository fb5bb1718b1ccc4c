//! Filter expressions over run attributes.
//!
//! A filter is `key<op>value`, e.g. `result=SUCCESS`,
//! `param.CHART_NAME~nova`, `started>=2024-01-01T00:00:00Z`,
//! `duration<90s`. Filters are parsed once and evaluated against the
//! typed attribute context built per run by the pipeline. Evaluation is a
//! conjunction; a key missing from the context fails the whole set.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Comparison operator. Parsing tries the symbol table longest-first, so
/// `>=` wins over `>` and `~=` over `~`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Substring,
    Regex,
    Prefix,
    Suffix,
    Gte,
    Lte,
    Gt,
    Lt,
}

const ORDERED_OPERATORS: [(&str, Operator); 10] = [
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("!=", Operator::Ne),
    ("~=", Operator::Regex),
    ("~", Operator::Substring),
    ("=", Operator::Eq),
    ("^", Operator::Prefix),
    ("$", Operator::Suffix),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

impl Operator {
    pub fn symbol(&self) -> &'static str {
        ORDERED_OPERATORS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(sym, _)| *sym)
            .unwrap_or("=")
    }
}

/// A single parsed `key<op>value` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub operator: Operator,
    pub value: String,
}

/// A typed attribute value looked up during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Instant(DateTime<Utc>),
    Span(Duration),
    List(Vec<String>),
}

impl AttrValue {
    /// String form used by grouping: instants render RFC3339, spans their
    /// canonical form, lists their first non-empty element.
    pub fn display(&self) -> String {
        match self {
            AttrValue::Str(s) => s.clone(),
            AttrValue::Int(n) => n.to_string(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Instant(t) => t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            AttrValue::Span(d) => format_span(*d),
            AttrValue::List(items) => items
                .iter()
                .find(|s| !s.is_empty())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// The per-run evaluation map.
pub type AttrContext = HashMap<String, AttrValue>;

/// Evaluation knobs. Regex matching for `~=` is opt-in; without it the
/// operator degrades to case-insensitive substring.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    pub allow_regex: bool,
}

const SUPPORTED_KEYS: [&str; 9] = [
    "result",
    "status",
    "branch",
    "commit",
    "cause.type",
    "cause.user",
    "queue.id",
    "started",
    "duration",
];

const SECRET_KEYWORDS: [&str; 7] = [
    "password", "secret", "token", "apikey", "api_key", "key", "pwd",
];

/// Parses raw flag values into filters. Empty entries are skipped.
pub fn parse(raw: &[String]) -> Result<Vec<Filter>> {
    let mut filters = Vec::with_capacity(raw.len());
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut parsed = None;
        for (symbol, op) in ORDERED_OPERATORS {
            if let Some(idx) = entry.find(symbol) {
                let key = entry[..idx].trim();
                let value = entry[idx + symbol.len()..].trim();
                parsed = Some((key.to_string(), op, value.to_string()));
                break;
            }
        }

        let Some((key, operator, value)) = parsed else {
            return Err(Error::InvalidFilter(entry.to_string()));
        };
        if key.is_empty() {
            return Err(Error::InvalidFilter(entry.to_string()));
        }
        validate_key(&key)?;

        filters.push(Filter {
            key,
            operator,
            value,
        });
    }
    Ok(filters)
}

fn validate_key(key: &str) -> Result<()> {
    if key.starts_with("param.") || key.starts_with("artifact.") || key.starts_with("cause.") {
        return Ok(());
    }
    if SUPPORTED_KEYS.contains(&key) {
        return Ok(());
    }
    Err(Error::UnsupportedKey(key.to_string()))
}

/// Returns true when every filter matches the context. An empty filter
/// set matches anything; a key absent from the context matches nothing.
pub fn evaluate(ctx: &AttrContext, filters: &[Filter], opts: EvalOptions) -> bool {
    filters.iter().all(|f| match ctx.get(&f.key) {
        Some(value) => evaluate_single(value, f, opts),
        None => false,
    })
}

fn evaluate_single(actual: &AttrValue, f: &Filter, opts: EvalOptions) -> bool {
    match actual {
        AttrValue::Str(s) => eval_string(s, f, opts),
        AttrValue::Int(n) => eval_number(*n as f64, f),
        AttrValue::Bool(b) => eval_bool(*b, f),
        AttrValue::Instant(t) => eval_instant(*t, f),
        AttrValue::Span(d) => eval_span(*d, f),
        AttrValue::List(items) => items.iter().any(|item| eval_string(item, f, opts)),
    }
}

fn eval_string(actual: &str, f: &Filter, opts: EvalOptions) -> bool {
    let expected = f.value.as_str();
    match f.operator {
        Operator::Eq => actual.eq_ignore_ascii_case(expected),
        Operator::Ne => !actual.eq_ignore_ascii_case(expected),
        Operator::Substring => actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::Prefix => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        Operator::Suffix => actual.to_lowercase().ends_with(&expected.to_lowercase()),
        Operator::Regex => {
            if !opts.allow_regex {
                return actual.to_lowercase().contains(&expected.to_lowercase());
            }
            // A pattern that fails to compile never matches.
            match regex::Regex::new(expected) {
                Ok(re) => re.is_match(actual),
                Err(_) => false,
            }
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let (Ok(actual_num), Ok(expected_num)) =
                (actual.parse::<f64>(), expected.parse::<f64>())
            else {
                return false;
            };
            compare_f64(actual_num, expected_num, f.operator)
        }
    }
}

fn eval_number(actual: f64, f: &Filter) -> bool {
    match f.value.parse::<f64>() {
        Ok(expected) => compare_f64(actual, expected, f.operator),
        Err(_) => false,
    }
}

fn eval_bool(actual: bool, f: &Filter) -> bool {
    let Some(expected) = parse_bool(&f.value) else {
        return false;
    };
    match f.operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        _ => false,
    }
}

fn eval_instant(actual: DateTime<Utc>, f: &Filter) -> bool {
    let Some(expected) = parse_time_or_duration(&f.value) else {
        return false;
    };
    match f.operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Gt => actual > expected,
        Operator::Gte => actual >= expected,
        Operator::Lt => actual < expected,
        Operator::Lte => actual <= expected,
        _ => false,
    }
}

fn eval_span(actual: Duration, f: &Filter) -> bool {
    match parse_duration(&f.value) {
        Ok(expected) => compare_f64(
            actual.as_nanos() as f64,
            expected.as_nanos() as f64,
            f.operator,
        ),
        Err(_) => false,
    }
}

fn compare_f64(actual: f64, expected: f64, op: Operator) -> bool {
    match op {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Gt => actual > expected,
        Operator::Gte => actual >= expected,
        Operator::Lt => actual < expected,
        Operator::Lte => actual <= expected,
        _ => false,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_time_or_duration(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = parse_duration(value) {
        let delta = chrono::Duration::from_std(d).ok()?;
        return Some(Utc::now() - delta);
    }
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parses a duration value: composite unit strings (`1h30m`, `500ms`),
/// day/week suffixes (`7d`, `2w`), or a bare number interpreted as
/// milliseconds. Units: ns, us, ms, s, m, h, d, w.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(Error::InvalidInput("empty duration".to_string()));
    }

    if let Some(prefix) = normalized.strip_suffix('d') {
        return scale_seconds(prefix, 86_400.0, value);
    }
    if let Some(prefix) = normalized.strip_suffix('w') {
        return scale_seconds(prefix, 604_800.0, value);
    }

    if normalized.contains(['h', 'm', 's', 'u', 'n']) {
        return parse_unit_sequence(&normalized)
            .ok_or_else(|| Error::InvalidInput(format!("invalid duration {value:?}")));
    }

    match normalized.parse::<f64>() {
        Ok(millis) if millis >= 0.0 => Ok(Duration::from_secs_f64(millis / 1000.0)),
        _ => Err(Error::InvalidInput(format!("invalid duration {value:?}"))),
    }
}

fn scale_seconds(number: &str, unit_seconds: f64, original: &str) -> Result<Duration> {
    match number.parse::<f64>() {
        Ok(n) if n >= 0.0 => Ok(Duration::from_secs_f64(n * unit_seconds)),
        _ => Err(Error::InvalidInput(format!(
            "invalid duration {original:?}"
        ))),
    }
}

fn parse_unit_sequence(s: &str) -> Option<Duration> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut total_seconds = 0.0f64;

    while i < bytes.len() {
        let number_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if i == number_start {
            return None;
        }
        let number: f64 = s[number_start..i].parse().ok()?;

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit_seconds = match &s[unit_start..i] {
            "ns" => 1e-9,
            "us" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total_seconds += number * unit_seconds;
    }

    (total_seconds >= 0.0).then(|| Duration::from_secs_f64(total_seconds))
}

/// Parses a `--since` value: RFC3339 timestamp, or a duration interpreted
/// as "that long ago".
pub fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("since value cannot be empty".into()));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    let d = parse_duration(trimmed)
        .map_err(|_| Error::InvalidInput(format!("invalid since value {value:?}")))?;
    let delta = chrono::Duration::from_std(d)
        .map_err(|_| Error::InvalidInput(format!("invalid since value {value:?}")))?;
    Ok(Utc::now() - delta)
}

fn format_span(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let mut seconds = d.as_secs();
    let ms = total_ms as u64 % 1000;
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || ms > 0 {
        if ms > 0 {
            out.push_str(&format!("{}.{:03}s", seconds, ms));
        } else {
            out.push_str(&format!("{seconds}s"));
        }
    }
    out
}

/// Whether a parameter name probably holds a secret.
pub fn is_likely_secret(name: &str) -> bool {
    let lower = name.to_lowercase();
    SECRET_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Supported top-level keys plus the prefixed families, for metadata
/// output.
pub fn allowed_keys() -> Vec<&'static str> {
    let mut keys = SUPPORTED_KEYS.to_vec();
    keys.extend(["param.*", "artifact.*", "cause.*"]);
    keys
}

/// Operator symbols in parse order.
pub fn operators() -> Vec<&'static str> {
    ORDERED_OPERATORS.iter().map(|(sym, _)| *sym).collect()
}

pub fn requires_parameters(filters: &[Filter]) -> bool {
    filters.iter().any(|f| f.key.starts_with("param."))
}

pub fn requires_artifacts(filters: &[Filter]) -> bool {
    filters.iter().any(|f| f.key.starts_with("artifact."))
}

pub fn requires_causes(filters: &[Filter]) -> bool {
    filters.iter().any(|f| f.key.starts_with("cause."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(raw: &str) -> Filter {
        parse(&[raw.to_string()]).unwrap().remove(0)
    }

    #[test]
    fn test_parse_operator_precedence() {
        assert_eq!(parse_one("duration>=90s").operator, Operator::Gte);
        assert_eq!(parse_one("result!=SUCCESS").operator, Operator::Ne);
        assert_eq!(parse_one("branch~=rel.*").operator, Operator::Regex);
        assert_eq!(parse_one("branch~main").operator, Operator::Substring);
        assert_eq!(parse_one("branch^release/").operator, Operator::Prefix);
        assert_eq!(parse_one("commit$abc").operator, Operator::Suffix);
        assert_eq!(parse_one("queue.id>100").operator, Operator::Gt);
    }

    #[test]
    fn test_parse_trims_key_and_value() {
        let f = parse_one(" result = SUCCESS ");
        assert_eq!(f.key, "result");
        assert_eq!(f.value, "SUCCESS");
    }

    #[test]
    fn test_parse_skips_blank_entries() {
        let filters = parse(&["".to_string(), "  ".to_string(), "result=ok".to_string()]).unwrap();
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_parse_rejects_missing_operator() {
        let err = parse(&["result".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        let err = parse(&["=SUCCESS".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        let err = parse(&["flavor=vanilla".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKey(_)));
    }

    #[test]
    fn test_parse_accepts_prefixed_keys() {
        for raw in ["param.CHART=nova", "artifact.name~report", "cause.user=amy"] {
            assert!(parse(&[raw.to_string()]).is_ok(), "{raw}");
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = vec!["result=SUCCESS".to_string(), "duration<5m".to_string()];
        assert_eq!(parse(&raw).unwrap(), parse(&raw).unwrap());
    }

    fn ctx_with(key: &str, value: AttrValue) -> AttrContext {
        let mut ctx = AttrContext::new();
        ctx.insert(key.to_string(), value);
        ctx
    }

    #[test]
    fn test_empty_filter_set_matches() {
        assert!(evaluate(&AttrContext::new(), &[], EvalOptions::default()));
    }

    #[test]
    fn test_missing_key_fails() {
        let filters = parse(&["result=SUCCESS".to_string()]).unwrap();
        assert!(!evaluate(
            &AttrContext::new(),
            &filters,
            EvalOptions::default()
        ));
    }

    #[test]
    fn test_string_operators_case_insensitive() {
        let ctx = ctx_with("result", AttrValue::Str("SUCCESS".into()));
        let matches = |raw: &str| {
            evaluate(
                &ctx,
                &parse(&[raw.to_string()]).unwrap(),
                EvalOptions::default(),
            )
        };
        assert!(matches("result=success"));
        assert!(matches("result~ucce"));
        assert!(matches("result^suc"));
        assert!(matches("result$ess"));
        assert!(!matches("result!=Success"));
    }

    #[test]
    fn test_regex_requires_opt_in() {
        let ctx = ctx_with("branch", AttrValue::Str("release/1.2".into()));
        let filters = parse(&["branch~=^release/\\d".to_string()]).unwrap();

        // Substring semantics by default: the literal pattern is not a
        // substring of the branch name.
        assert!(!evaluate(&ctx, &filters, EvalOptions::default()));
        assert!(evaluate(&ctx, &filters, EvalOptions { allow_regex: true }));
    }

    #[test]
    fn test_invalid_regex_evaluates_false() {
        let ctx = ctx_with("branch", AttrValue::Str("main".into()));
        let filters = parse(&["branch~=[unclosed".to_string()]).unwrap();
        assert!(!evaluate(&ctx, &filters, EvalOptions { allow_regex: true }));
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = ctx_with("queue.id", AttrValue::Int(120));
        let matches = |raw: &str| {
            evaluate(
                &ctx,
                &parse(&[raw.to_string()]).unwrap(),
                EvalOptions::default(),
            )
        };
        assert!(matches("queue.id>100"));
        assert!(matches("queue.id<=120"));
        assert!(matches("queue.id=120"));
        assert!(!matches("queue.id<100"));
        assert!(!matches("queue.id>not-a-number"));
    }

    #[test]
    fn test_bool_eval_permissive_values() {
        let ctx = ctx_with("building", AttrValue::Bool(true));
        for (value, want) in [("yes", true), ("TRUE", true), ("0", false), ("maybe", false)] {
            let f = Filter {
                key: "building".into(),
                operator: Operator::Eq,
                value: value.into(),
            };
            assert_eq!(
                evaluate(&ctx, std::slice::from_ref(&f), EvalOptions::default()),
                want,
                "{value}"
            );
        }
    }

    #[test]
    fn test_span_comparison_uses_duration_grammar() {
        let ctx = ctx_with("duration", AttrValue::Span(Duration::from_secs(90)));
        let matches = |raw: &str| {
            evaluate(
                &ctx,
                &parse(&[raw.to_string()]).unwrap(),
                EvalOptions::default(),
            )
        };
        assert!(matches("duration>=1m"));
        assert!(matches("duration<2m"));
        assert!(matches("duration=90000"));
        assert!(!matches("duration>1.5m"));
    }

    #[test]
    fn test_instant_against_duration_ago() {
        let ctx = ctx_with(
            "started",
            AttrValue::Instant(Utc::now() - chrono::Duration::hours(1)),
        );
        let matches = |raw: &str| {
            evaluate(
                &ctx,
                &parse(&[raw.to_string()]).unwrap(),
                EvalOptions::default(),
            )
        };
        // Started after "2 hours ago", before "30 minutes ago".
        assert!(matches("started>2h"));
        assert!(matches("started<30m"));
    }

    #[test]
    fn test_list_matches_any_element() {
        let ctx = ctx_with(
            "cause.user",
            AttrValue::List(vec!["amy".into(), "bob".into()]),
        );
        let filters = parse(&["cause.user=bob".to_string()]).unwrap();
        assert!(evaluate(&ctx, &filters, EvalOptions::default()));
    }

    #[test]
    fn test_conjunction_semantics() {
        let mut ctx = AttrContext::new();
        ctx.insert("result".into(), AttrValue::Str("SUCCESS".into()));
        ctx.insert("branch".into(), AttrValue::Str("main".into()));

        let both = parse(&["result=SUCCESS".to_string(), "branch=main".to_string()]).unwrap();
        assert!(evaluate(&ctx, &both, EvalOptions::default()));

        let one_off = parse(&["result=SUCCESS".to_string(), "branch=dev".to_string()]).unwrap();
        assert!(!evaluate(&ctx, &one_off, EvalOptions::default()));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("0d").unwrap(), Duration::ZERO);
        assert_eq!(
            parse_duration("1.5d").unwrap(),
            Duration::from_secs(36 * 3600)
        );
        assert_eq!(parse_duration("168h").unwrap(), parse_duration("7d").unwrap());
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86_400));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 90s ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for raw in ["", "abc", "1x", "h", "--3s"] {
            assert!(parse_duration(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_since() {
        let fixed = parse_since("2024-03-01T12:00:00Z").unwrap();
        assert_eq!(fixed.to_rfc3339_opts(chrono::SecondsFormat::Secs, true), "2024-03-01T12:00:00Z");

        let ago = parse_since("2h").unwrap();
        let delta = Utc::now() - ago;
        assert!((delta.num_minutes() - 120).abs() <= 1);

        assert!(parse_since("").is_err());
        assert!(parse_since("not-a-time").is_err());
    }

    #[test]
    fn test_is_likely_secret() {
        for name in [
            "PASSWORD",
            "db_password",
            "apiKey",
            "API_KEY",
            "ssh-key",
            "TOKEN",
            "pwd",
            "client_secret",
        ] {
            assert!(is_likely_secret(name), "{name}");
        }
        for name in ["CHART_NAME", "environment", "REPLICAS"] {
            assert!(!is_likely_secret(name), "{name}");
        }
    }

    #[test]
    fn test_allowed_keys_and_operators() {
        let keys = allowed_keys();
        assert!(keys.contains(&"result"));
        assert!(keys.contains(&"param.*"));
        assert_eq!(operators().len(), 10);
        assert_eq!(operators()[0], ">=");
    }

    #[test]
    fn test_requirement_probes() {
        let filters = parse(&[
            "param.CHART=nova".to_string(),
            "result=SUCCESS".to_string(),
        ])
        .unwrap();
        assert!(requires_parameters(&filters));
        assert!(!requires_artifacts(&filters));
        assert!(!requires_causes(&filters));
    }

    #[test]
    fn test_attr_value_display() {
        assert_eq!(AttrValue::Str("x".into()).display(), "x");
        assert_eq!(AttrValue::Int(7).display(), "7");
        assert_eq!(AttrValue::Bool(true).display(), "true");
        assert_eq!(
            AttrValue::Span(Duration::from_millis(45_000)).display(),
            "45s"
        );
        assert_eq!(
            AttrValue::List(vec!["".into(), "second".into()]).display(),
            "second"
        );
    }
}
