//! Render host contract
//!
//! Nodes describe themselves as a [`ViewNode`] tree. A host turns that tree
//! into whatever its output medium is; tests inspect it directly.

use crate::error::{SceneError, SceneResult};
use crate::object::{SceneKey, SceneObject};
use crate::url_sync::Location;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Description of a rendered node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewNode {
    /// Element kind
    pub kind: String,
    /// Key of the scene object that produced this node
    pub key: Option<SceneKey>,
    /// Text content
    pub text: Option<String>,
    /// Test hook
    pub test_id: Option<String>,
    /// Extra attributes
    pub attributes: IndexMap<String, String>,
    /// Nested views in order
    pub children: Vec<ViewNode>,
}

impl ViewNode {
    /// View produced by a scene object
    #[must_use]
    pub fn new(kind: &str, key: SceneKey) -> Self {
        Self {
            key: Some(key),
            ..Self::element(kind)
        }
    }

    /// View not tied to a scene object
    #[must_use]
    pub fn element(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            key: None,
            text: None,
            test_id: None,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the test hook
    #[must_use]
    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a child view
    #[must_use]
    pub fn with_child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search for a view
    #[must_use]
    pub fn find(&self, predicate: &dyn Fn(&ViewNode) -> bool) -> Option<&ViewNode> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(predicate))
    }

    /// View carrying the given test hook
    #[must_use]
    pub fn find_by_test_id(&self, test_id: &str) -> Option<&ViewNode> {
        self.find(&|v| v.test_id.as_deref() == Some(test_id))
    }

    /// Check if any view in the tree shows exactly `text`
    #[must_use]
    pub fn contains_text(&self, text: &str) -> bool {
        self.find(&|v| v.text.as_deref() == Some(text)).is_some()
    }

    /// All text in depth-first order
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_texts(&mut out);
        out
    }

    fn collect_texts(&self, out: &mut Vec<String>) {
        if let Some(text) = &self.text {
            out.push(text.clone());
        }
        for child in &self.children {
            child.collect_texts(out);
        }
    }
}

/// Template interpolation supplied by the host
pub trait TemplateInterpolator: Send + Sync {
    /// Interpolate `template` in the scope of `object`
    fn interpolate(&self, object: &dyn SceneObject, template: &str) -> String;
}

/// Router state available while rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterState {
    /// Location being rendered
    pub location: Location,
}

/// Inputs shared by every view function in one render pass
#[derive(Clone, Default)]
pub struct RenderContext {
    router: Option<RouterState>,
    interpolator: Option<Arc<dyn TemplateInterpolator>>,
}

impl RenderContext {
    /// Context without router or interpolation
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide router state
    #[must_use]
    pub fn with_router(mut self, location: Location) -> Self {
        self.router = Some(RouterState { location });
        self
    }

    /// Provide template interpolation
    #[must_use]
    pub fn with_interpolator(mut self, interpolator: Arc<dyn TemplateInterpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    /// Router state, if rendering inside a router
    #[inline]
    #[must_use]
    pub fn router(&self) -> Option<&RouterState> {
        self.router.as_ref()
    }

    /// Router state or [`SceneError::OutsideRouter`]
    pub fn require_router(&self) -> SceneResult<&RouterState> {
        self.router.as_ref().ok_or(SceneError::OutsideRouter)
    }

    /// Interpolate with the host interpolator, or return the template unchanged
    #[must_use]
    pub fn interpolate(&self, object: &dyn SceneObject, template: &str) -> String {
        match &self.interpolator {
            Some(interpolator) => interpolator.interpolate(object, template),
            None => template.to_string(),
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("router", &self.router)
            .field("interpolator", &self.interpolator.is_some())
            .finish()
    }
}
