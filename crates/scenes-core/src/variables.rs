//! Variable contracts shared by the graph and the variable subsystem
//!
//! Concrete variables and sets live in `scenes-variables`; the graph only
//! needs these traits to resolve names through ancestors.

use crate::error::SceneResult;
use crate::events::SceneEvent;
use crate::object::{attach, SceneKey, SceneNode, SceneObject};
use crate::scene_object_casts;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sentinel stored as the value of an "all" selection
pub const ALL_VARIABLE_VALUE: &str = "$__all";

/// Display text of an "all" selection
pub const ALL_VARIABLE_TEXT: &str = "All";

/// Value that formats itself instead of going through the format registry
pub trait CustomVariableValue: Send + Sync + fmt::Debug {
    /// Render for the given format id (`None` for the default format)
    fn formatter(&self, format: Option<&str>) -> String;
}

/// Resolved value of a variable
#[derive(Debug, Clone)]
pub enum VariableValue {
    /// Single value
    Text(String),
    /// Multiple values
    List(Vec<String>),
    /// Self-formatting value
    Custom(Arc<dyn CustomVariableValue>),
}

impl VariableValue {
    /// Plain string form: lists join with commas, custom values use their default format
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(values) => values.join(","),
            Self::Custom(custom) => custom.formatter(None),
        }
    }

    /// Check for an empty text or list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(values) => values.is_empty(),
            Self::Custom(_) => false,
        }
    }

    /// Values as a list, wrapping single values
    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s.clone()],
            Self::List(values) => values.clone(),
            Self::Custom(custom) => vec![custom.formatter(None)],
        }
    }
}

impl PartialEq for VariableValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a.formatter(None) == b.formatter(None),
            _ => false,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for VariableValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for VariableValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Visibility of a variable's picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableHide {
    /// Show label and picker
    #[default]
    DontHide,
    /// Show picker only
    HideLabel,
    /// Hide entirely
    HideVariable,
}

/// Future driving one variable resolution
pub type VariableUpdate = BoxFuture<'static, SceneResult<()>>;

/// A named, resolvable value in the scene graph
pub trait SceneVariable: SceneObject {
    /// Variable name, unique within its set
    fn name(&self) -> String;

    /// Picker label
    fn label(&self) -> Option<String> {
        None
    }

    /// Picker visibility
    fn hide(&self) -> VariableHide {
        VariableHide::DontHide
    }

    /// Current value, optionally narrowed by a field path
    fn get_value(&self, field_path: Option<&str>) -> Option<VariableValue>;

    /// Display text of the current value
    fn get_value_text(&self, field_path: Option<&str>) -> String;

    /// Check if the selection is the all-sentinel without a custom all value
    fn has_all_value(&self) -> bool {
        false
    }

    /// Check if a resolution is in flight
    fn is_loading(&self) -> bool {
        false
    }

    /// Last resolution error
    fn error(&self) -> Option<String> {
        None
    }

    /// Start a resolution against current options; `None` when the variable
    /// has nothing to validate
    fn validate_and_update(self: Arc<Self>) -> Option<VariableUpdate> {
        None
    }

    /// Upcast into a plain variable handle
    fn into_variable(self: Arc<Self>) -> Arc<dyn SceneVariable>;
}

/// An ordered collection of variables resolvable by name
pub trait SceneVariables: SceneObject {
    /// Variable declared in this set
    fn get_by_name(&self, name: &str) -> Option<Arc<dyn SceneVariable>>;

    /// Variables in declaration order
    fn variables(&self) -> Vec<Arc<dyn SceneVariable>>;

    /// Check if the variable is resolving or queued for resolution
    fn is_variable_loading_or_waiting_to_update(&self, variable: &dyn SceneVariable) -> bool;
}

/// Variable references declared by a scene object
pub trait VariableDependency: Send + Sync {
    /// Referenced variable names
    fn names(&self) -> Vec<String>;

    /// Check if `name` is referenced
    fn has_dependency_on(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }

    /// Called once a referenced variable finished resolving
    fn variable_update_completed(&self, variable: &dyn SceneVariable, has_changed: bool);
}

/// Published (and bubbled) whenever a variable finishes a resolution or a
/// caller assigns a new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneVariableValueChangedEvent {
    /// Variable name
    pub name: String,
    /// Key of the variable's node
    pub key: SceneKey,
}

impl SceneEvent for SceneVariableValueChangedEvent {
    fn event_type(&self) -> &'static str {
        "scene-variable-changed-value"
    }
}

/// Variable set with no variables, returned when no ancestor declares one
pub struct EmptyVariableSet {
    node: SceneNode,
}

impl EmptyVariableSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Arc<Self> {
        attach(Self {
            node: SceneNode::new(),
        })
    }
}

impl SceneObject for EmptyVariableSet {
    fn node(&self) -> &SceneNode {
        &self.node
    }

    fn kind(&self) -> &'static str {
        "EmptyVariableSet"
    }

    scene_object_casts!();

    fn as_variable_set(&self) -> Option<&dyn SceneVariables> {
        Some(self)
    }
}

impl SceneVariables for EmptyVariableSet {
    fn get_by_name(&self, _name: &str) -> Option<Arc<dyn SceneVariable>> {
        None
    }

    fn variables(&self) -> Vec<Arc<dyn SceneVariable>> {
        Vec::new()
    }

    fn is_variable_loading_or_waiting_to_update(&self, _variable: &dyn SceneVariable) -> bool {
        false
    }
}
