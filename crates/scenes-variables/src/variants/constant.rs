//! Variables with a fixed value

use scenes_core::prelude::*;
use scenes_core::{SceneVariable, VariableHide, VariableValue};
use std::sync::Arc;

/// State of a [`ConstantVariable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantVariableState {
    /// Variable name
    pub name: String,
    /// Fixed value
    pub value: String,
    /// Picker visibility, hidden unless overridden
    pub hide: VariableHide,
}

impl SceneState for ConstantVariableState {}

/// Variable holding a fixed, hidden value
///
/// Nothing to resolve, so a set completes it immediately.
pub struct ConstantVariable {
    base: SceneObjectBase<ConstantVariableState>,
}

impl ConstantVariable {
    /// Constant named `name`
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(ConstantVariableState {
                name: name.into(),
                value: value.into(),
                hide: VariableHide::HideVariable,
            }),
        })
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<ConstantVariableState> {
        self.base.state()
    }
}

impl SceneObject for ConstantVariable {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "constant"
    }

    scene_object_casts!();

    fn as_variable(&self) -> Option<&dyn SceneVariable> {
        Some(self)
    }
}

impl SceneVariable for ConstantVariable {
    fn name(&self) -> String {
        self.base.state().name.clone()
    }

    fn hide(&self) -> VariableHide {
        self.base.state().hide
    }

    fn get_value(&self, _field_path: Option<&str>) -> Option<VariableValue> {
        Some(VariableValue::Text(self.base.state().value.clone()))
    }

    fn get_value_text(&self, _field_path: Option<&str>) -> String {
        self.base.state().value.clone()
    }

    fn into_variable(self: Arc<Self>) -> Arc<dyn SceneVariable> {
        self
    }
}
