//! Layout capability and flex layout nodes

use crate::error::SceneResult;
use crate::object::{
    attach, SceneNode, SceneObject, SceneObjectBase, SceneObjectRef, SceneSlots, SceneState,
};
use crate::scene_object_casts;
use crate::view::{RenderContext, ViewNode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Layout capability
pub trait SceneLayout: Send + Sync {
    /// Layout family name
    fn layout_kind(&self) -> &'static str;

    /// Check if children can be rearranged by dragging
    fn is_draggable(&self) -> bool {
        false
    }
}

/// Main axis of a flex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexDirection {
    /// Children side by side
    #[default]
    Row,
    /// Children stacked
    Column,
}

impl FlexDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
        }
    }
}

/// State of a [`SceneFlexLayout`]
#[derive(Clone, Default)]
pub struct SceneFlexLayoutState {
    /// Main axis
    pub direction: FlexDirection,
    /// Items in render order
    pub children: Vec<SceneObjectRef>,
    /// Providers scoped to this layout
    pub slots: SceneSlots,
}

impl SceneState for SceneFlexLayoutState {
    fn slots(&self) -> SceneSlots {
        self.slots.clone()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        self.children.iter().for_each(|c| visit(c));
    }
}

/// Flex container
pub struct SceneFlexLayout {
    base: SceneObjectBase<SceneFlexLayoutState>,
}

impl SceneFlexLayout {
    /// Layout from state
    #[must_use]
    pub fn new(state: SceneFlexLayoutState) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(state),
        })
    }

    /// Row of children
    #[must_use]
    pub fn row(children: Vec<SceneObjectRef>) -> Arc<Self> {
        Self::new(SceneFlexLayoutState {
            children,
            ..SceneFlexLayoutState::default()
        })
    }

    /// Column of children
    #[must_use]
    pub fn column(children: Vec<SceneObjectRef>) -> Arc<Self> {
        Self::new(SceneFlexLayoutState {
            direction: FlexDirection::Column,
            children,
            ..SceneFlexLayoutState::default()
        })
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneFlexLayoutState> {
        &self.base
    }
}

impl SceneLayout for SceneFlexLayout {
    fn layout_kind(&self) -> &'static str {
        "flex"
    }
}

impl SceneObject for SceneFlexLayout {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneFlexLayout"
    }

    scene_object_casts!();

    fn slots(&self) -> SceneSlots {
        self.base.slots()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        self.base.for_each_child(visit);
    }

    fn as_layout(&self) -> Option<&dyn SceneLayout> {
        Some(self)
    }

    fn render(&self, ctx: &RenderContext) -> SceneResult<ViewNode> {
        let state = self.base.state();
        let mut view = ViewNode::new(self.kind(), self.node().key().clone())
            .with_attribute("direction", state.direction.as_str());
        for child in &state.children {
            view = view.with_child(child.render(ctx)?);
        }
        Ok(view)
    }
}

/// State of a [`SceneFlexItem`]
#[derive(Clone)]
pub struct SceneFlexItemState {
    /// Wrapped content
    pub body: SceneObjectRef,
    /// Relative size on the main axis
    pub grow: Option<u32>,
    /// Providers scoped to this item
    pub slots: SceneSlots,
}

impl SceneState for SceneFlexItemState {
    fn slots(&self) -> SceneSlots {
        self.slots.clone()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        visit(&self.body);
    }
}

/// Item of a flex layout
pub struct SceneFlexItem {
    base: SceneObjectBase<SceneFlexItemState>,
}

impl SceneFlexItem {
    /// Item wrapping `body`
    #[must_use]
    pub fn new(body: SceneObjectRef) -> Arc<Self> {
        Self::with_state(SceneFlexItemState {
            body,
            grow: None,
            slots: SceneSlots::default(),
        })
    }

    /// Item from state
    #[must_use]
    pub fn with_state(state: SceneFlexItemState) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(state),
        })
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneFlexItemState> {
        &self.base
    }
}

impl SceneObject for SceneFlexItem {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneFlexItem"
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
        let mut view = ViewNode::new(self.kind(), self.node().key().clone());
        if let Some(grow) = state.grow {
            view = view.with_attribute("grow", grow.to_string());
        }
        Ok(view.with_child(state.body.render(ctx)?))
    }
}
