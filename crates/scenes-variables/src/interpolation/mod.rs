//! Template interpolation
//!
//! Each reference in a template resolves, in order, against the caller's
//! [`ScopedVars`], the [`MacroRegistry`] and the variables visible from the
//! object being interpolated. The value then goes through the format named
//! by the reference (or the caller's default format).
//!
//! Interpolation only reads the graph; it never starts a variable update.

pub mod formats;
pub mod macros;
pub mod scoped;

pub use formats::{
    query_param, split_format, FormatContext, FormatRegistry, FormatValue, VariableFormatter,
    DEFAULT_FORMAT,
};
pub use macros::{
    is_reserved_name, Macro, MacroContext, MacroRegistry, SkipFormattingValue, UrlParamsValue,
};
pub use scoped::{DataContext, DisplayValue, ScopedVar, ScopedVars};

use once_cell::sync::Lazy;
use scenes_core::template::{self, VariableReference};
use scenes_core::{graph, SceneObject, TemplateInterpolator, VariableValue};
use tracing::warn;

static DEFAULT_INTERPOLATOR: Lazy<SceneInterpolator> = Lazy::new(SceneInterpolator::with_defaults);

/// Interpolate `template` for `object` with the built-in formats and macros
#[must_use]
pub fn interpolate(
    object: &dyn SceneObject,
    template: &str,
    scoped: Option<&ScopedVars>,
    format: Option<&str>,
) -> String {
    DEFAULT_INTERPOLATOR.interpolate(object, template, scoped, format)
}

/// Formats and macros used to expand templates
#[derive(Debug, Clone, Default)]
pub struct SceneInterpolator {
    formats: FormatRegistry,
    macros: MacroRegistry,
}

/// Resolved reference: value plus display text
struct Resolved {
    value: VariableValue,
    text: String,
}

impl SceneInterpolator {
    /// Interpolator from explicit registries
    #[must_use]
    pub fn new(formats: FormatRegistry, macros: MacroRegistry) -> Self {
        Self { formats, macros }
    }

    /// Interpolator with the built-in formats and macros
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FormatRegistry::with_defaults(), MacroRegistry::with_defaults())
    }

    /// Format registry
    #[inline]
    #[must_use]
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Format registry, for registering custom formats
    #[inline]
    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    /// Macro registry
    #[inline]
    #[must_use]
    pub fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    /// Macro registry, for registering custom macros
    #[inline]
    pub fn macros_mut(&mut self) -> &mut MacroRegistry {
        &mut self.macros
    }

    /// Expand every reference in `template`
    ///
    /// `format` applies to references that name no format themselves.
    /// Unresolvable references expand to `""`.
    #[must_use]
    pub fn interpolate(
        &self,
        object: &dyn SceneObject,
        template: &str,
        scoped: Option<&ScopedVars>,
        format: Option<&str>,
    ) -> String {
        self.expand(object, template, scoped, format, false)
    }

    /// `nested` is set while expanding the output of a custom value; references
    /// that resolve to nothing there are kept verbatim and expanded no further.
    fn expand(
        &self,
        object: &dyn SceneObject,
        template: &str,
        scoped: Option<&ScopedVars>,
        format: Option<&str>,
        nested: bool,
    ) -> String {
        if template.is_empty() || !template::contains_references(template) {
            return template.to_string();
        }
        template::replace_references(template, |reference| {
            let Some(resolved) = self.resolve(object, reference, scoped) else {
                return if nested {
                    reference.matched.to_string()
                } else {
                    String::new()
                };
            };
            let format = reference.format.or(format);
            match resolved.value {
                VariableValue::Custom(custom) => {
                    let output = custom.formatter(format);
                    if nested {
                        output
                    } else {
                        self.expand(object, &output, scoped, None, true)
                    }
                }
                VariableValue::Text(value) => {
                    self.apply_format(reference, FormatValue::Single(&value), &resolved.text, format)
                }
                VariableValue::List(values) => {
                    self.apply_format(reference, FormatValue::List(&values), &resolved.text, format)
                }
            }
        })
    }

    fn resolve(
        &self,
        object: &dyn SceneObject,
        reference: &VariableReference<'_>,
        scoped: Option<&ScopedVars>,
    ) -> Option<Resolved> {
        if let Some(var) = scoped.and_then(|s| s.get(reference.name)) {
            return Some(Resolved {
                value: var.value.clone(),
                text: var.text.clone(),
            });
        }

        if let Some(m) = self.macros.get(reference.name) {
            let ctx = MacroContext {
                name: reference.name,
                object,
                scoped,
            };
            let value = m.get_value(&ctx, reference.field_path)?;
            return Some(Resolved {
                text: m.get_value_text(&ctx, reference.field_path),
                value,
            });
        }

        let variable = graph::lookup_variable(reference.name, object)?;
        let value = variable.get_value(reference.field_path)?;
        Some(Resolved {
            text: variable.get_value_text(reference.field_path),
            value,
        })
    }

    fn apply_format(
        &self,
        reference: &VariableReference<'_>,
        value: FormatValue<'_>,
        text: &str,
        format: Option<&str>,
    ) -> String {
        let (id, args) = split_format(format.unwrap_or(DEFAULT_FORMAT));
        let (formatter, args) = match self.formats.get(id) {
            Some(formatter) => (formatter, args),
            None => {
                warn!(format = id, variable = reference.name, "unknown format; using default");
                match self.formats.get(DEFAULT_FORMAT) {
                    Some(formatter) => (formatter, Vec::new()),
                    None => return text.to_string(),
                }
            }
        };
        let ctx = FormatContext {
            name: reference.name,
            args: &args,
            text,
        };
        formatter.format(value, &ctx)
    }
}

impl TemplateInterpolator for SceneInterpolator {
    fn interpolate(&self, object: &dyn SceneObject, template: &str) -> String {
        SceneInterpolator::interpolate(self, object, template, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::SceneVariableSet;
    use crate::variants::{ConstantVariable, TextBoxVariable};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use scenes_core::prelude::*;
    use scenes_core::{
        DataFrame, Field, FieldType, SceneCanvasText, SceneFlexLayout, SceneTimeRange,
        SceneVariable,
    };
    use std::sync::Arc;

    fn scene(variables: Vec<Arc<dyn SceneVariable>>) -> (Arc<SceneFlexLayout>, Arc<SceneCanvasText>) {
        let text = SceneCanvasText::new("leaf");
        let layout = SceneFlexLayout::new(SceneFlexLayoutState {
            children: vec![text.clone()],
            slots: SceneSlots {
                variables: Some(SceneVariableSet::new(variables)),
                time_range: Some(SceneTimeRange::new(
                    "2021-01-01T10:00:00Z",
                    "2021-01-01T12:00:00Z",
                )),
                ..SceneSlots::default()
            },
            ..SceneFlexLayoutState::default()
        });
        (layout, text)
    }

    #[test]
    fn plain_and_empty_templates_pass_through() {
        let (_layout, leaf) = scene(Vec::new());
        assert_eq!(interpolate(&*leaf, "", None, None), "");
        assert_eq!(interpolate(&*leaf, "no refs here", None, None), "no refs here");
    }

    #[test]
    fn resolves_every_reference_form() {
        let (_layout, leaf) = scene(vec![
            ConstantVariable::new("server", "A"),
            TextBoxVariable::new("query", "up"),
        ]);
        assert_eq!(
            interpolate(&*leaf, "$server [[query]] ${server} ${query:raw}", None, None),
            "A up A up"
        );
    }

    #[test]
    fn unresolved_references_become_empty() {
        let (_layout, leaf) = scene(Vec::new());
        assert_eq!(interpolate(&*leaf, "a-${missing}-b", None, None), "a--b");
    }

    #[test]
    fn scoped_vars_win_over_graph() {
        let (_layout, leaf) = scene(vec![ConstantVariable::new("server", "A")]);
        let scoped = ScopedVars::new().with("server", "scoped");
        assert_eq!(interpolate(&*leaf, "${server}", Some(&scoped), None), "scoped");
    }

    #[test]
    fn list_values_use_requested_format() {
        let (_layout, leaf) = scene(Vec::new());
        let scoped = ScopedVars::new().with("hosts", vec!["a", "b"]);
        assert_eq!(interpolate(&*leaf, "${hosts}", Some(&scoped), None), "a,b");
        assert_eq!(interpolate(&*leaf, "${hosts:pipe}", Some(&scoped), None), "a|b");
        assert_eq!(
            interpolate(&*leaf, "${hosts}", Some(&scoped), Some("regex")),
            "(a|b)"
        );
        assert_eq!(interpolate(&*leaf, "${hosts:nope}", Some(&scoped), None), "a,b");
    }

    #[test]
    fn text_format_uses_display_text() {
        let (_layout, leaf) = scene(Vec::new());
        let scoped = ScopedVars::new().with_text("host", "Host A", "a");
        assert_eq!(interpolate(&*leaf, "${host:text}", Some(&scoped), None), "Host A");
    }

    #[test]
    fn time_macros() {
        let (_layout, leaf) = scene(Vec::new());
        assert_eq!(interpolate(&*leaf, "${__from}", None, None), "1609495200000");
        assert_eq!(
            interpolate(&*leaf, "${__to:date:iso}", None, None),
            "2021-01-01T12:00:00.000Z"
        );
        assert_eq!(
            interpolate(&*leaf, "${__from:text}", None, None),
            "2021-01-01 10:00:00"
        );
        assert_eq!(
            interpolate(&*leaf, "${__url_time_range}", None, None),
            "from=2021-01-01T10%3A00%3A00Z&to=2021-01-01T12%3A00%3A00Z"
        );
    }

    #[test]
    fn all_variables_macro() {
        let (_layout, leaf) = scene(vec![
            ConstantVariable::new("server", "A"),
            TextBoxVariable::new("query", "a b"),
        ]);
        assert_eq!(
            interpolate(&*leaf, "${__all_variables}", None, None),
            "var-server=A&var-query=a%20b"
        );
    }

    #[test]
    fn data_macros_read_the_data_context() {
        let (_layout, leaf) = scene(Vec::new());
        let frame = DataFrame::new(
            Some("cpu"),
            vec![
                Field::new("time", vec![1000.into(), 2000.into()]).with_type(FieldType::Time),
                Field::new("value", vec![10.into(), 20.5.into()])
                    .with_type(FieldType::Number)
                    .with_label("host", "a"),
            ],
        );
        let scoped = ScopedVars::new().with_data_context(DataContext::row(frame, 1, 1));

        let expand = |template: &str| interpolate(&*leaf, template, Some(&scoped), None);
        assert_eq!(expand("${__value.raw}"), "20.5");
        assert_eq!(expand("${__value.time}"), "2000");
        assert_eq!(expand("${__series.name}"), "cpu");
        assert_eq!(expand("${__field.name}"), "value");
        assert_eq!(expand("${__field.labels.host}"), "a");
        assert_eq!(expand("${__data.fields[0]}"), "2000");
        assert_eq!(expand("${__data.fields.value}"), "20.5");
    }

    #[test]
    fn data_macros_without_context_are_empty() {
        let (_layout, leaf) = scene(Vec::new());
        assert_eq!(interpolate(&*leaf, "[${__value.raw}]", None, None), "[]");
    }

    #[test]
    fn renders_through_host_interpolator() {
        let (layout, _leaf) = scene(vec![ConstantVariable::new("server", "A")]);
        let text = SceneCanvasText::new("server: $server");
        layout.base().set_state(|s| s.children.push(text.clone()));
        let interpolator = SceneInterpolator::with_defaults();
        assert_eq!(
            TemplateInterpolator::interpolate(&interpolator, &*text, "$server"),
            "A"
        );
    }

    proptest! {
        #[test]
        fn templates_without_references_are_unchanged(template in "[a-zA-Z0-9 ,.:/-]{0,40}") {
            let (_layout, leaf) = scene(Vec::new());
            prop_assert_eq!(interpolate(&*leaf, &template, None, None), template);
        }

        #[test]
        fn scalar_values_pass_through_csv(value in "[a-zA-Z0-9_.-]{1,20}") {
            let (_layout, leaf) = scene(Vec::new());
            let scoped = ScopedVars::new().with("v", value.as_str());
            prop_assert_eq!(interpolate(&*leaf, "${v}", Some(&scoped), None), value);
        }
    }
}
