//! Scenes Variables
//!
//! Named values that scene objects reference from templates:
//! - Variables resolve their options asynchronously and keep a selection that
//!   always converges to something the options allow
//! - Sets resolve their variables in dependency order and tell dependent
//!   scene objects when a value changed
//! - Interpolation expands `$name`, `${name:format}` and built-in macros
//!
//! # Example
//!
//! ```rust
//! use scenes_core::prelude::*;
//! use scenes_core::{SceneCanvasText, SceneFlexLayout};
//! use scenes_variables::interpolation::interpolate;
//! use scenes_variables::{ConstantVariable, SceneVariableSet};
//!
//! let text = SceneCanvasText::new("leaf");
//! let _scene = SceneFlexLayout::new(SceneFlexLayoutState {
//!     children: vec![text.clone()],
//!     slots: SceneSlots {
//!         variables: Some(SceneVariableSet::new(vec![ConstantVariable::new("region", "eu")])),
//!         ..SceneSlots::default()
//!     },
//!     ..SceneFlexLayoutState::default()
//! });
//!
//! assert_eq!(
//!     interpolate(&*text, "/api?${region:queryparam}", None, None),
//!     "/api?var-region=eu"
//! );
//! ```

#![warn(missing_docs)]

pub mod dependency;
pub mod error;
pub mod interpolation;
pub mod multi_value;
pub mod selection;
pub mod set;
pub mod variants;

// Re-exports
pub use dependency::VariableDependencyConfig;
pub use error::{VariableError, VariableResult};
pub use interpolation::{interpolate, SceneInterpolator, ScopedVars};
pub use multi_value::{
    CustomAllValue, MultiValueVariable, MultiValueVariableState, OptionsRequest, OptionsStream,
    ValueOptionsSource, VARIABLE_URL_PREFIX,
};
pub use selection::{VariableSelection, VariableValueOption};
pub use set::{SceneVariableSet, SceneVariableSetState, UpdateReport, VariableSetConfig};
pub use variants::{
    ConstantVariable, CustomOptions, CustomVariable, TestOptions, TestVariable, TextBoxVariable,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring and resolving variables
    pub use crate::{
        interpolate, MultiValueVariable, MultiValueVariableState, SceneInterpolator,
        SceneVariableSet, ScopedVars, VariableError, VariableResult, VariableSelection,
        VariableSetConfig, VariableValueOption,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
