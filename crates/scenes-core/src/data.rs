//! Data provider capability and static data nodes

use crate::object::{attach, SceneNode, SceneObject, SceneObjectBase, SceneState};
use crate::scene_object_casts;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Loading state of a data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingState {
    /// Nothing requested yet
    #[default]
    NotStarted,
    /// Request in flight
    Loading,
    /// Partial results are arriving
    Streaming,
    /// Results complete
    Done,
    /// Request failed
    Error,
}

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    /// Timestamps in epoch milliseconds
    Time,
    /// Numbers
    Number,
    /// Strings
    String,
    /// Anything else
    #[default]
    Other,
}

/// One column of a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Display name override
    pub display_name: Option<String>,
    /// Series labels
    pub labels: IndexMap<String, String>,
    /// Column values
    pub values: Vec<serde_json::Value>,
}

impl Field {
    /// Field with values
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            values,
            ..Self::default()
        }
    }

    /// Set the value type
    #[must_use]
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Attach a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Name shown to users
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Columnar result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    /// Frame name
    pub name: Option<String>,
    /// Query the frame came from
    pub ref_id: Option<String>,
    /// Columns
    pub fields: Vec<Field>,
}

impl DataFrame {
    /// Frame with columns
    #[must_use]
    pub fn new(name: Option<&str>, fields: Vec<Field>) -> Self {
        Self {
            name: name.map(str::to_string),
            ref_id: None,
            fields,
        }
    }

    /// Column by name or display name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name || f.display_name() == name)
    }

    /// First time-typed column
    #[must_use]
    pub fn time_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == FieldType::Time)
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.first().map_or(0, |f| f.values.len())
    }

    /// Check for zero rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot published by a data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelData {
    /// Loading state
    pub state: LoadingState,
    /// Result frames
    pub series: Vec<DataFrame>,
    /// Error message when `state` is `Error`
    pub error: Option<String>,
}

/// Data provider capability
pub trait SceneDataProvider: SceneObject {
    /// Latest data snapshot
    fn data(&self) -> PanelData;

    /// Check for an in-flight request
    fn is_loading(&self) -> bool {
        matches!(
            self.data().state,
            LoadingState::Loading | LoadingState::Streaming
        )
    }
}

/// State of a [`SceneDataNode`]
#[derive(Debug, Clone, Default)]
pub struct SceneDataNodeState {
    /// Current data
    pub data: PanelData,
}

impl SceneState for SceneDataNodeState {}

/// Data provider holding a fixed snapshot
pub struct SceneDataNode {
    base: SceneObjectBase<SceneDataNodeState>,
}

impl SceneDataNode {
    /// Provider with a snapshot
    #[must_use]
    pub fn new(data: PanelData) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(SceneDataNodeState { data }),
        })
    }

    /// Provider with no frames, reported when no ancestor provides data
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::new(PanelData {
            state: LoadingState::Done,
            ..PanelData::default()
        })
    }

    /// Replace the snapshot
    pub fn set_data(&self, data: PanelData) {
        self.base.set_state(|s| s.data = data);
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneDataNodeState> {
        &self.base
    }
}

impl SceneObject for SceneDataNode {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneDataNode"
    }

    scene_object_casts!();
}

impl SceneDataProvider for SceneDataNode {
    fn data(&self) -> PanelData {
        self.base.state().data.clone()
    }
}
