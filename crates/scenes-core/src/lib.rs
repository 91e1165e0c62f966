//! Scenes Core
//!
//! Scene object graph: typed node state, parent/child ownership, activation
//! lifecycle, event buses and ancestor-scoped resource resolution.
//!
//! # Overview
//!
//! - **SceneObject**: a node in the tree, held as `Arc<dyn SceneObject>`
//! - **SceneObjectBase**: immutable state snapshots replaced on update
//! - **graph**: nearest-ancestor lookup of time ranges, data, variables and layouts
//! - **UrlSyncManager**: moves node state to and from query strings
//!
//! # Example
//!
//! ```rust
//! use scenes_core::prelude::*;
//! use scenes_core::{graph, SceneCanvasText, SceneFlexLayout, SceneTimeRange, SceneTimeRangeLike};
//!
//! let text = SceneCanvasText::new("CPU");
//! let layout = SceneFlexLayout::new(SceneFlexLayoutState {
//!     children: vec![text.clone()],
//!     slots: SceneSlots {
//!         time_range: Some(SceneTimeRange::new("now-1h", "now")),
//!         ..SceneSlots::default()
//!     },
//!     ..SceneFlexLayoutState::default()
//! });
//!
//! layout.activate();
//! assert!(text.is_active());
//! assert_eq!(graph::get_time_range(&*text).raw().from, "now-1h");
//! ```

#![warn(missing_docs)]

pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod graph;
pub mod layout;
pub mod lifecycle;
pub mod object;
pub mod template;
pub mod time_range;
pub mod url_sync;
pub mod variables;
pub mod view;

// Re-exports
pub use components::{EmbeddedScene, EmbeddedSceneState, SceneCanvasText, SceneCanvasTextState};
pub use data::{DataFrame, Field, FieldType, LoadingState, PanelData, SceneDataNode, SceneDataProvider};
pub use error::{SceneError, SceneResult};
pub use events::{EventBus, SceneEvent, Subscription};
pub use layout::{
    FlexDirection, SceneFlexItem, SceneFlexItemState, SceneFlexLayout, SceneFlexLayoutState,
    SceneLayout,
};
pub use object::{
    attach, downcast_arc, SceneKey, SceneNode, SceneObject, SceneObjectBase, SceneObjectExt,
    SceneObjectRef, SceneSlots, SceneState, StateChange,
};
pub use time_range::{RawTimeRange, SceneTimeRange, SceneTimeRangeLike, TimeRange};
pub use url_sync::{
    Location, SceneObjectUrlValues, UrlSyncHandler, UrlSyncManager, UrlSyncOptions, UrlValue,
};
pub use variables::{
    CustomVariableValue, SceneVariable, SceneVariableValueChangedEvent, SceneVariables,
    VariableDependency, VariableHide, VariableUpdate, VariableValue, ALL_VARIABLE_TEXT,
    ALL_VARIABLE_VALUE,
};
pub use view::{RenderContext, TemplateInterpolator, ViewNode};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building scene objects
    pub use crate::{
        attach, scene_object_casts, SceneError, SceneFlexLayoutState, SceneKey, SceneNode,
        SceneObject, SceneObjectBase, SceneObjectExt, SceneObjectRef, SceneResult, SceneSlots,
        SceneState, Subscription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
