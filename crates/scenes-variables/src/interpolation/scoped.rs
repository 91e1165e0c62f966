//! Caller-supplied variables and data context

use indexmap::IndexMap;
use scenes_core::{DataFrame, Field, VariableValue};

/// One scoped variable
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedVar {
    /// Display text
    pub text: String,
    /// Value
    pub value: VariableValue,
}

/// Formatted cell value computed by a display processor
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayValue {
    /// Formatted text
    pub text: String,
    /// Numeric value
    pub numeric: f64,
}

/// Row and field being rendered, for the data macros
#[derive(Debug, Clone, PartialEq)]
pub struct DataContext {
    /// Frame holding the field
    pub frame: DataFrame,
    /// Index of the field in `frame`
    pub field_index: usize,
    /// Row being rendered
    pub row_index: Option<usize>,
    /// Reduced value, when rendering a calculation instead of a row
    pub calculated_value: Option<DisplayValue>,
}

impl DataContext {
    /// Context for one row of one field
    #[must_use]
    pub fn row(frame: DataFrame, field_index: usize, row_index: usize) -> Self {
        Self {
            frame,
            field_index,
            row_index: Some(row_index),
            calculated_value: None,
        }
    }

    /// Field being rendered
    #[must_use]
    pub fn field(&self) -> Option<&Field> {
        self.frame.fields.get(self.field_index)
    }
}

/// Variables that take precedence over the graph during one interpolation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedVars {
    vars: IndexMap<String, ScopedVar>,
    data_context: Option<DataContext>,
}

impl ScopedVars {
    /// Empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable whose text is its plain value
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        let value = value.into();
        self.vars.insert(
            name.into(),
            ScopedVar {
                text: value.to_plain_string(),
                value,
            },
        );
        self
    }

    /// Add a variable with distinct display text
    #[must_use]
    pub fn with_text(
        mut self,
        name: impl Into<String>,
        text: impl Into<String>,
        value: impl Into<VariableValue>,
    ) -> Self {
        self.vars.insert(
            name.into(),
            ScopedVar {
                text: text.into(),
                value: value.into(),
            },
        );
        self
    }

    /// Attach the data context read by `__value`, `__data`, `__series` and `__field`
    #[must_use]
    pub fn with_data_context(mut self, context: DataContext) -> Self {
        self.data_context = Some(context);
        self
    }

    /// Variable by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScopedVar> {
        self.vars.get(name)
    }

    /// Data context, if any
    #[inline]
    #[must_use]
    pub fn data_context(&self) -> Option<&DataContext> {
        self.data_context.as_ref()
    }
}
