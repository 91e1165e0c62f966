//! Built-in macros
//!
//! Macros resolve before any variable, so their names are reserved.

use super::formats::query_param;
use super::scoped::{DataContext, ScopedVars};
use once_cell::sync::Lazy;
use scenes_core::graph;
use scenes_core::url_sync::{to_query_string, SceneObjectUrlValues};
use scenes_core::{CustomVariableValue, SceneObject, VariableValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a macro may look at while resolving
#[derive(Clone, Copy)]
pub struct MacroContext<'a> {
    /// Referenced name
    pub name: &'a str,
    /// Object the template is interpolated for
    pub object: &'a dyn SceneObject,
    /// Caller-supplied scope
    pub scoped: Option<&'a ScopedVars>,
}

impl MacroContext<'_> {
    fn data_context(&self) -> Option<&DataContext> {
        self.scoped.and_then(ScopedVars::data_context)
    }
}

/// A reserved name resolved from context instead of a variable
pub trait Macro: Send + Sync {
    /// Resolved value
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue>;

    /// Display text
    fn get_value_text(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> String {
        self.get_value(ctx, field_path)
            .map(|v| v.to_plain_string())
            .unwrap_or_default()
    }
}

/// Value that ignores the requested format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipFormattingValue(pub String);

impl CustomVariableValue for SkipFormattingValue {
    fn formatter(&self, _format: Option<&str>) -> String {
        self.0.clone()
    }
}

/// Query string of a URL, narrowed by `include:` / `exclude:` formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParamsValue {
    query: SceneObjectUrlValues,
}

impl UrlParamsValue {
    fn render(query: &SceneObjectUrlValues) -> String {
        let search = to_query_string(query);
        if search.is_empty() {
            String::new()
        } else {
            format!("?{search}")
        }
    }
}

impl CustomVariableValue for UrlParamsValue {
    fn formatter(&self, format: Option<&str>) -> String {
        let Some((mode, keys)) = format.and_then(|f| f.split_once(':')) else {
            return Self::render(&self.query);
        };
        let keys: Vec<&str> = keys.split(',').collect();
        let mut query = self.query.clone();
        match mode {
            "exclude" => query.retain(|k, _| !keys.contains(&k.as_str())),
            "include" => query.retain(|k, _| keys.contains(&k.as_str())),
            _ => {}
        }
        Self::render(&query)
    }
}

/// Registry of macros by reserved name
#[derive(Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<dyn Macro>>,
}

impl MacroRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
        }
    }

    /// Create registry with built-in macros
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("__all_variables", AllVariablesMacro);
        registry.register("__url_time_range", UrlTimeRangeMacro);
        registry.register("__from", TimeMacro::From);
        registry.register("__to", TimeMacro::To);
        registry.register("__timezone", TimezoneMacro);
        registry.register("__url", UrlMacro);
        registry.register("__value", ValueMacro);
        registry.register("__data", DataMacro);
        registry.register("__series", SeriesMacro);
        registry.register("__field", FieldMacro);
        registry
    }

    /// Register a macro, replacing any macro with the same name
    pub fn register(&mut self, name: &str, m: impl Macro + 'static) {
        self.macros.insert(name.to_string(), Arc::new(m));
    }

    /// Macro by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Macro>> {
        self.macros.get(name)
    }

    /// Check if `name` is a macro
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Macro names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get number of registered macros
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("macros", &self.names())
            .finish()
    }
}

static BUILT_IN: Lazy<MacroRegistry> = Lazy::new(MacroRegistry::with_defaults);

/// Check if `name` belongs to a built-in macro and so cannot name a variable
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    BUILT_IN.contains(name)
}

/// Every visible variable as `var-<name>=<value>` pairs
struct AllVariablesMacro;

impl Macro for AllVariablesMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, _field_path: Option<&str>) -> Option<VariableValue> {
        let mut params = Vec::new();
        for variable in graph::collect_all_variables(ctx.object) {
            let name = variable.name();
            if variable.has_all_value() {
                params.push(query_param(&name, &[scenes_core::ALL_VARIABLE_VALUE.to_string()]));
                continue;
            }
            match variable.get_value(None) {
                None => {}
                Some(VariableValue::Custom(custom)) => {
                    params.push(custom.formatter(Some("queryparam")));
                }
                Some(value) => params.push(query_param(&name, &value.as_list())),
            }
        }
        Some(VariableValue::Custom(Arc::new(SkipFormattingValue(
            params.join("&"),
        ))))
    }
}

/// `from=..&to=..` of the closest time range
struct UrlTimeRangeMacro;

impl Macro for UrlTimeRangeMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, _field_path: Option<&str>) -> Option<VariableValue> {
        let time_range = graph::get_time_range(ctx.object);
        let state = time_range
            .as_url_sync()
            .map(|handler| handler.get_url_state())
            .unwrap_or_default();
        Some(VariableValue::Custom(Arc::new(SkipFormattingValue(
            to_query_string(&state),
        ))))
    }
}

/// `__from` / `__to` as epoch milliseconds
enum TimeMacro {
    From,
    To,
}

impl Macro for TimeMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, _field_path: Option<&str>) -> Option<VariableValue> {
        let range = graph::get_time_range(ctx.object).time_range();
        let instant = match self {
            Self::From => range.from,
            Self::To => range.to,
        };
        Some(VariableValue::Text(instant.timestamp_millis().to_string()))
    }

    fn get_value_text(&self, ctx: &MacroContext<'_>, _field_path: Option<&str>) -> String {
        let range = graph::get_time_range(ctx.object).time_range();
        let instant = match self {
            Self::From => range.from,
            Self::To => range.to,
        };
        instant.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Zone of the closest time range, as declared
struct TimezoneMacro;

impl Macro for TimezoneMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, _field_path: Option<&str>) -> Option<VariableValue> {
        Some(VariableValue::Text(
            graph::get_time_range(ctx.object).time_zone(),
        ))
    }
}

/// Location of the closest node that knows one; `path` and `params` narrow it
struct UrlMacro;

impl Macro for UrlMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue> {
        let location = graph::get_closest(ctx.object, |o| o.current_location())?;
        let value: Arc<dyn CustomVariableValue> = match field_path {
            Some("path") => Arc::new(SkipFormattingValue(location.path)),
            Some("params") => Arc::new(UrlParamsValue {
                query: location.query,
            }),
            _ => Arc::new(SkipFormattingValue(location.to_url_string())),
        };
        Some(VariableValue::Custom(value))
    }
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cell under the data context: `raw`, `numeric`, `text` (default) or `time`
struct ValueMacro;

impl Macro for ValueMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue> {
        let data = ctx.data_context()?;
        if let Some(calculated) = &data.calculated_value {
            let text = match field_path {
                Some("numeric" | "raw") => calculated.numeric.to_string(),
                Some("time") => String::new(),
                _ => calculated.text.clone(),
            };
            return Some(VariableValue::Text(text));
        }

        let row = data.row_index?;
        if field_path == Some("time") {
            let time = data.frame.time_field()?.values.get(row)?;
            return Some(VariableValue::Text(display(time)));
        }
        let cell = data.field()?.values.get(row)?;
        let text = match field_path {
            Some("numeric") => cell
                .as_f64()
                .map_or_else(|| String::from("NaN"), |n| n.to_string()),
            _ => display(cell),
        };
        Some(VariableValue::Text(text))
    }
}

/// Frame under the data context: `name`, `refId` and `fields[..]` cells of the current row
struct DataMacro;

impl Macro for DataMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue> {
        let data = ctx.data_context()?;
        let path = field_path?;
        match path {
            "name" => return data.frame.name.clone().map(VariableValue::Text),
            "refId" => return data.frame.ref_id.clone().map(VariableValue::Text),
            _ => {}
        }
        let accessor = path.strip_prefix("fields")?;
        let key = if let Some(name) = accessor.strip_prefix('.') {
            name
        } else {
            accessor
                .strip_prefix('[')?
                .strip_suffix(']')?
                .trim_matches(|c| c == '"' || c == '\'')
        };
        let field = match key.parse::<usize>() {
            Ok(index) => data.frame.fields.get(index),
            Err(_) => data.frame.field(key),
        }?;
        let cell = field.values.get(data.row_index?)?;
        Some(VariableValue::Text(display(cell)))
    }
}

/// Series under the data context: `name`
struct SeriesMacro;

impl Macro for SeriesMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue> {
        let data = ctx.data_context()?;
        match field_path {
            Some("name") => data.frame.name.clone().map(VariableValue::Text),
            _ => None,
        }
    }
}

/// Field under the data context: `name`, `displayName`, `labels`, `labels.<key>`
struct FieldMacro;

impl Macro for FieldMacro {
    fn get_value(&self, ctx: &MacroContext<'_>, field_path: Option<&str>) -> Option<VariableValue> {
        let field = ctx.data_context()?.field()?;
        let text = match field_path? {
            "name" => field.name.clone(),
            "displayName" => field.display_name().to_string(),
            "labels" => {
                let pairs: Vec<String> = field
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}=\"{v}\""))
                    .collect();
                format!("{{{}}}", pairs.join(", "))
            }
            path => field.labels.get(path.strip_prefix("labels.")?)?.clone(),
        };
        Some(VariableValue::Text(text))
    }
}
