//! Error types for the scene graph
//!
//! Structural errors are programming mistakes in how a tree was assembled
//! (no layout above a node, rendering outside a router). Recoverable errors
//! carry data problems that a host can surface and retry.

use crate::object::SceneKey;

/// Main scene graph error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// No ancestor exposes the layout capability
    #[error("No layout found in scene tree (searched from {key})")]
    NoLayout {
        /// Node the search started from
        key: SceneKey,
    },

    /// Operation requires an active node
    #[error("scene object {key} is not active")]
    NotActive {
        /// Offending node
        key: SceneKey,
    },

    /// Node was rendered by a router-aware host without a router
    #[error("Invariant failed: You should not use <Switch> outside a <Router>")]
    OutsideRouter,

    /// A time range expression could not be parsed
    #[error("invalid time expression '{expr}'")]
    InvalidTimeExpression {
        /// Raw expression
        expr: String,
    },

    /// A variable could not resolve its options
    #[error("variable '{name}' failed to update: {reason}")]
    VariableUpdate {
        /// Variable name
        name: String,
        /// Failure description
        reason: String,
    },

    /// A resolution was superseded or torn down before it finished
    #[error("operation cancelled")]
    Cancelled,

    /// State is inconsistent with the requested operation
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl SceneError {
    /// Check if the error stems from how the tree was assembled
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::NoLayout { .. } | Self::OutsideRouter)
    }

    /// Check if a host can retry or surface the error without rebuilding the tree
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::VariableUpdate { .. } | Self::InvalidTimeExpression { .. }
        )
    }
}

/// Result alias for scene graph operations
pub type SceneResult<T> = Result<T, SceneError>;
