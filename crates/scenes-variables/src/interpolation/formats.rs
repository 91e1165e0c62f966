//! Value formats applied by `${name:format}`
//!
//! Provides [`FormatRegistry`] mapping format ids to formatters.

use crate::multi_value::VARIABLE_URL_PREFIX;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Format used when a reference names none
pub const DEFAULT_FORMAT: &str = "csv";

/// Value handed to a formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatValue<'a> {
    /// Scalar
    Single(&'a str),
    /// List
    List(&'a [String]),
}

impl FormatValue<'_> {
    fn map_join(&self, separator: &str, map: impl Fn(&str) -> String) -> String {
        match self {
            Self::Single(v) => map(v),
            Self::List(values) => values
                .iter()
                .map(|v| map(v))
                .collect::<Vec<_>>()
                .join(separator),
        }
    }
}

/// What a formatter knows about the reference besides its value
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    /// Referenced name
    pub name: &'a str,
    /// Arguments following the format id
    pub args: &'a [&'a str],
    /// Display text of the referenced variable
    pub text: &'a str,
}

/// A value format
pub trait VariableFormatter: Send + Sync {
    /// Render `value`
    fn format(&self, value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String;
}

impl<F> VariableFormatter for F
where
    F: Fn(FormatValue<'_>, &FormatContext<'_>) -> String + Send + Sync,
{
    fn format(&self, value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String {
        self(value, ctx)
    }
}

/// Registry of available formats
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: HashMap<String, Arc<dyn VariableFormatter>>,
}

impl FormatRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// Create registry with built-in formats
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("csv", csv);
        registry.register("raw", csv);
        registry.register("pipe", pipe);
        registry.register("regex", regex);
        registry.register("glob", glob);
        registry.register("json", json);
        registry.register("lucene", lucene);
        registry.register("sqlstring", sql_string);
        registry.register("singlequote", single_quote);
        registry.register("doublequote", double_quote);
        registry.register("distributed", distributed);
        registry.register("percentencode", percent_encode);
        registry.register("queryparam", query_param_format);
        registry.register("html", html);
        registry.register("text", text);
        registry.register("date", date);
        registry
    }

    /// Register a format, replacing any format with the same id
    pub fn register(&mut self, id: &str, formatter: impl VariableFormatter + 'static) {
        self.formats.insert(id.to_string(), Arc::new(formatter));
    }

    /// Formatter by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn VariableFormatter>> {
        self.formats.get(id)
    }

    /// Check if format exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.formats.contains_key(id)
    }

    /// Remove format
    #[inline]
    pub fn remove(&mut self, id: &str) -> bool {
        self.formats.remove(id).is_some()
    }

    /// List all registered format ids, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get number of registered formats
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names())
            .finish()
    }
}

/// Split `id:arg:arg` into the id and its arguments
#[must_use]
pub fn split_format(format: &str) -> (&str, Vec<&str>) {
    let mut parts = format.split(':');
    let id = parts.next().unwrap_or_default();
    (id, parts.collect())
}

/// `var-<name>=<value>` pairs joined with `&`
#[must_use]
pub fn query_param(name: &str, values: &[String]) -> String {
    values
        .iter()
        .map(|v| {
            format!(
                "{VARIABLE_URL_PREFIX}{}={}",
                urlencoding::encode(name),
                urlencoding::encode(v)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn csv(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    value.map_join(",", str::to_string)
}

fn pipe(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    value.map_join("|", str::to_string)
}

fn escape_regex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$*+?.()|[]{}/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn regex(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::List(values) if values.len() > 1 => {
            let escaped: Vec<String> = values.iter().map(|v| escape_regex(v)).collect();
            format!("({})", escaped.join("|"))
        }
        other => other.map_join("", escape_regex),
    }
}

fn glob(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::List(values) if values.len() > 1 => format!("{{{}}}", values.join(",")),
        other => other.map_join(",", str::to_string),
    }
}

fn json(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    let encoded = match value {
        FormatValue::Single(v) => serde_json::to_string(v),
        FormatValue::List(values) => serde_json::to_string(values),
    };
    encoded.unwrap_or_default()
}

fn escape_lucene(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_whitespace() || "!*+-=<>&|()[]{}^~?:\\/\"".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn lucene(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::Single(v) => escape_lucene(v),
        FormatValue::List([]) => "__empty__".to_string(),
        FormatValue::List(values) => {
            let quoted: Vec<String> = values
                .iter()
                .map(|v| format!("\"{}\"", escape_lucene(v)))
                .collect();
            format!("({})", quoted.join(" OR "))
        }
    }
}

fn sql_string(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    value.map_join(",", |v| format!("'{}'", v.replace('\'', "''")))
}

fn single_quote(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    value.map_join(",", |v| format!("'{}'", v.replace('\'', "\\'")))
}

fn double_quote(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    value.map_join(",", |v| format!("\"{}\"", v.replace('"', "\\\"")))
}

fn distributed(value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::Single(v) => v.to_string(),
        FormatValue::List(values) => values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i == 0 {
                    v.clone()
                } else {
                    format!("{}={v}", ctx.name)
                }
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn percent_encode(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::Single(v) => urlencoding::encode(v).into_owned(),
        FormatValue::List(values) => {
            urlencoding::encode(&format!("{{{}}}", values.join(","))).into_owned()
        }
    }
}

fn query_param_format(value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String {
    match value {
        FormatValue::Single(v) => query_param(ctx.name, &[v.to_string()]),
        FormatValue::List(values) => query_param(ctx.name, values),
    }
}

fn html(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
    let joined = value.map_join(", ", str::to_string);
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn text(_value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String {
    ctx.text.to_string()
}

/// Epoch milliseconds rendered as `ms`, `seconds`, `iso` (the default) or
/// a chrono format string
fn date(value: FormatValue<'_>, ctx: &FormatContext<'_>) -> String {
    let raw = value.map_join(",", str::to_string);
    let Ok(millis) = raw.parse::<i64>() else {
        return raw;
    };
    let Some(instant) = DateTime::<Utc>::from_timestamp_millis(millis) else {
        return raw;
    };
    match ctx.args {
        [] | ["iso"] => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        ["ms"] => raw,
        ["seconds"] => ((millis as f64) / 1000.0).round().to_string(),
        pattern => instant.format(&pattern.join(":")).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn apply(id: &str, value: FormatValue<'_>) -> String {
        apply_with(id, value, &[])
    }

    fn apply_with(id: &str, value: FormatValue<'_>, args: &[&str]) -> String {
        let registry = FormatRegistry::with_defaults();
        let ctx = FormatContext {
            name: "server",
            args,
            text: "Server A",
        };
        registry
            .get(id)
            .map(|f| f.format(value, &ctx))
            .unwrap_or_default()
    }

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn registry_with_defaults() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.len(), 16);
        assert!(registry.contains("csv"));
        assert!(registry.contains("queryparam"));
        assert!(!registry.contains("unknown"));
    }

    #[test]
    fn registry_register_and_remove() {
        let mut registry = FormatRegistry::new();
        assert!(registry.is_empty());
        fn upper(value: FormatValue<'_>, _ctx: &FormatContext<'_>) -> String {
            value.map_join(",", str::to_uppercase)
        }
        registry.register("upper", upper);
        assert!(registry.contains("upper"));
        assert!(registry.remove("upper"));
        assert!(!registry.contains("upper"));
    }

    #[test]
    fn list_formats() {
        let values = list(&["a", "b.c"]);
        let v = FormatValue::List(&values);
        assert_eq!(apply("csv", v), "a,b.c");
        assert_eq!(apply("pipe", v), "a|b.c");
        assert_eq!(apply("regex", v), "(a|b\\.c)");
        assert_eq!(apply("glob", v), "{a,b.c}");
        assert_eq!(apply("json", v), "[\"a\",\"b.c\"]");
        assert_eq!(apply("distributed", v), "a,server=b.c");
        assert_eq!(apply("queryparam", v), "var-server=a&var-server=b.c");
        assert_eq!(apply("percentencode", v), "%7Ba%2Cb.c%7D");
        assert_eq!(apply("lucene", v), "(\"a\" OR \"b.c\")");
    }

    #[test]
    fn quoting_formats() {
        let v = FormatValue::Single("it's");
        assert_eq!(apply("sqlstring", v), "'it''s'");
        assert_eq!(apply("singlequote", v), "'it\\'s'");
        assert_eq!(apply("doublequote", FormatValue::Single("a\"b")), "\"a\\\"b\"");
        assert_eq!(apply("html", FormatValue::Single("<b>")), "&lt;b&gt;");
        assert_eq!(apply("lucene", FormatValue::Single("a b")), "a\\ b");
        assert_eq!(apply("text", v), "Server A");
    }

    #[test]
    fn date_formats() {
        let v = FormatValue::Single("1609495200000");
        assert_eq!(apply("date", v), "2021-01-01T10:00:00.000Z");
        assert_eq!(apply_with("date", v, &["ms"]), "1609495200000");
        assert_eq!(apply_with("date", v, &["seconds"]), "1609495200");
        assert_eq!(apply_with("date", v, &["%Y", "%m"]), "2021:01");
        assert_eq!(apply("date", FormatValue::Single("soon")), "soon");
    }

    #[test]
    fn split_format_arguments() {
        assert_eq!(split_format("date:iso"), ("date", vec!["iso"]));
        assert_eq!(split_format("csv"), ("csv", vec![]));
    }
}
