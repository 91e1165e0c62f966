//! Free-text variables

use crate::multi_value::VARIABLE_URL_PREFIX;
use scenes_core::prelude::*;
use scenes_core::url_sync::{SceneObjectUrlValues, UrlSyncHandler, UrlValue};
use scenes_core::{SceneVariable, SceneVariableValueChangedEvent, VariableValue};
use std::sync::Arc;

/// State of a [`TextBoxVariable`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextBoxVariableState {
    /// Variable name
    pub name: String,
    /// Picker label
    pub label: Option<String>,
    /// Entered text
    pub value: String,
    /// Keep the variable out of the URL
    pub skip_url_sync: bool,
}

impl SceneState for TextBoxVariableState {}

/// Variable whose value is typed in by the user
pub struct TextBoxVariable {
    base: SceneObjectBase<TextBoxVariableState>,
}

impl TextBoxVariable {
    /// Text box named `name` with an initial value
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Arc<Self> {
        Self::with_state(TextBoxVariableState {
            name: name.into(),
            value: value.into(),
            ..TextBoxVariableState::default()
        })
    }

    /// Text box from state
    #[must_use]
    pub fn with_state(state: TextBoxVariableState) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(state),
        })
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<TextBoxVariableState> {
        self.base.state()
    }

    /// Replace the text and publish a value-changed event
    pub fn set_value(&self, value: impl Into<String>) {
        let value = value.into();
        self.base.set_state(|s| s.value = value);
        let event = SceneVariableValueChangedEvent {
            name: self.base.state().name.clone(),
            key: self.key().clone(),
        };
        self.publish_to_ancestors(&event);
    }

    fn url_key(&self) -> String {
        format!("{VARIABLE_URL_PREFIX}{}", self.base.state().name)
    }
}

impl SceneObject for TextBoxVariable {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "textbox"
    }

    scene_object_casts!();

    fn as_variable(&self) -> Option<&dyn SceneVariable> {
        Some(self)
    }

    fn as_url_sync(&self) -> Option<&dyn UrlSyncHandler> {
        Some(self)
    }
}

impl SceneVariable for TextBoxVariable {
    fn name(&self) -> String {
        self.base.state().name.clone()
    }

    fn label(&self) -> Option<String> {
        self.base.state().label.clone()
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

impl UrlSyncHandler for TextBoxVariable {
    fn url_keys(&self) -> Vec<String> {
        vec![self.url_key()]
    }

    fn get_url_state(&self) -> SceneObjectUrlValues {
        let state = self.base.state();
        let mut values = SceneObjectUrlValues::new();
        if !state.skip_url_sync {
            values.insert(self.url_key(), UrlValue::Single(state.value.clone()));
        }
        values
    }

    fn update_from_url(&self, values: &SceneObjectUrlValues) {
        if let Some(value) = values.get(&self.url_key()).and_then(UrlValue::first) {
            self.set_value(value);
        }
    }
}
