//! Reference scene objects: scene roots and text leaves

use crate::error::SceneResult;
use crate::object::{
    attach, SceneNode, SceneObject, SceneObjectBase, SceneObjectRef, SceneSlots, SceneState,
};
use crate::scene_object_casts;
use crate::template;
use crate::variables::{SceneVariable, VariableDependency};
use crate::view::{RenderContext, ViewNode};
use std::sync::Arc;

/// State of an [`EmbeddedScene`]
#[derive(Clone)]
pub struct EmbeddedSceneState {
    /// Main content
    pub body: SceneObjectRef,
    /// Controls rendered above the body
    pub controls: Vec<SceneObjectRef>,
    /// Scene-wide providers
    pub slots: SceneSlots,
}

impl SceneState for EmbeddedSceneState {
    fn slots(&self) -> SceneSlots {
        self.slots.clone()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        self.controls.iter().for_each(|c| visit(c));
        visit(&self.body);
    }
}

/// Root of a self-contained scene
pub struct EmbeddedScene {
    base: SceneObjectBase<EmbeddedSceneState>,
}

impl EmbeddedScene {
    /// Scene around `body`
    #[must_use]
    pub fn new(body: SceneObjectRef) -> Arc<Self> {
        Self::with_state(EmbeddedSceneState {
            body,
            controls: Vec::new(),
            slots: SceneSlots::default(),
        })
    }

    /// Scene from state
    #[must_use]
    pub fn with_state(state: EmbeddedSceneState) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(state),
        })
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<EmbeddedSceneState> {
        &self.base
    }
}

impl SceneObject for EmbeddedScene {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "EmbeddedScene"
    }

    scene_object_casts!();

    fn slots(&self) -> SceneSlots {
        self.base.slots()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        self.base.for_each_child(visit);
    }

    fn render(&self, ctx: &RenderContext) -> SceneResult<ViewNode> {
        let state = self.base.state();
        let mut controls = ViewNode::element("controls");
        for control in &state.controls {
            controls = controls.with_child(control.render(ctx)?);
        }
        Ok(ViewNode::new(self.kind(), self.node().key().clone())
            .with_child(controls)
            .with_child(state.body.render(ctx)?))
    }
}

/// State of a [`SceneCanvasText`]
#[derive(Debug, Clone)]
pub struct SceneCanvasTextState {
    /// Template rendered through the host interpolator
    pub text: String,
}

impl SceneState for SceneCanvasTextState {}

/// Text leaf whose content is interpolated at render time
pub struct SceneCanvasText {
    base: SceneObjectBase<SceneCanvasTextState>,
}

impl SceneCanvasText {
    /// Text leaf
    #[must_use]
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(SceneCanvasTextState { text: text.into() }),
        })
    }

    /// Raw template
    #[must_use]
    pub fn text(&self) -> String {
        self.base.state().text.clone()
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneCanvasTextState> {
        &self.base
    }
}

impl SceneObject for SceneCanvasText {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneCanvasText"
    }

    scene_object_casts!();

    fn variable_dependency(&self) -> Option<&dyn VariableDependency> {
        Some(self)
    }

    fn render(&self, ctx: &RenderContext) -> SceneResult<ViewNode> {
        let text = ctx.interpolate(self, &self.base.state().text);
        Ok(ViewNode::new(self.kind(), self.node().key().clone()).with_text(text))
    }
}

impl VariableDependency for SceneCanvasText {
    fn names(&self) -> Vec<String> {
        template::referenced_names(&self.base.state().text)
    }

    fn variable_update_completed(&self, _variable: &dyn SceneVariable, _has_changed: bool) {}
}
