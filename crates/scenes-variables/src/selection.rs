//! Selected values and selectable options of multi-value variables

use scenes_core::{VariableValue, ALL_VARIABLE_TEXT, ALL_VARIABLE_VALUE};
use serde::{Deserialize, Serialize};

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableValueOption {
    /// Display label
    pub label: String,
    /// Underlying value
    pub value: String,
}

impl VariableValueOption {
    /// Option with distinct label and value
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Option whose label is its value
    #[must_use]
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }

    /// The synthetic "All" option
    #[must_use]
    pub fn all() -> Self {
        Self::new(ALL_VARIABLE_TEXT, ALL_VARIABLE_VALUE)
    }
}

/// Current selection: a scalar or an ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableSelection {
    /// Scalar
    Single(String),
    /// Ordered list
    Multi(Vec<String>),
}

impl VariableSelection {
    /// The all-sentinel as a scalar
    #[must_use]
    pub fn all() -> Self {
        Self::Single(ALL_VARIABLE_VALUE.to_string())
    }

    /// Entries in order; a scalar yields one entry
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Single(v) => vec![v.clone()],
            Self::Multi(values) => values.clone(),
        }
    }

    /// First entry
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// Check for the list form
    #[inline]
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// Check if `value` is selected
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(v) => v == value,
            Self::Multi(values) => values.iter().any(|v| v == value),
        }
    }

    /// Check if the selection is or contains the all-sentinel
    #[inline]
    #[must_use]
    pub fn has_all(&self) -> bool {
        self.contains(ALL_VARIABLE_VALUE)
    }

    /// Check for an empty scalar or an empty list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(v) => v.is_empty(),
            Self::Multi(values) => values.is_empty(),
        }
    }
}

impl Default for VariableSelection {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl From<&str> for VariableSelection {
    fn from(v: &str) -> Self {
        Self::Single(v.to_string())
    }
}

impl From<String> for VariableSelection {
    fn from(v: String) -> Self {
        Self::Single(v)
    }
}

impl From<Vec<&str>> for VariableSelection {
    fn from(values: Vec<&str>) -> Self {
        Self::Multi(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for VariableSelection {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

impl From<VariableSelection> for VariableValue {
    fn from(selection: VariableSelection) -> Self {
        match selection {
            VariableSelection::Single(v) => Self::Text(v),
            VariableSelection::Multi(values) => Self::List(values),
        }
    }
}
