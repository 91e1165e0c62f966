//! Error types for scene apps

use scenes_core::SceneError;
use scenes_variables::VariableError;

/// Main app error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Pages were rendered without a router location
    #[error("Invariant failed: You should not use <Switch> outside a <Router>")]
    OutsideRouter,

    /// A drilldown route template could not be parsed
    #[error("invalid route '{template}': {reason}")]
    InvalidRoute {
        /// Template as declared
        template: String,
        /// What is wrong with it
        reason: String,
    },

    /// A variable set under the current page failed to settle
    #[error(transparent)]
    Variable(#[from] VariableError),

    /// Scene graph error raised while rendering
    #[error(transparent)]
    Core(SceneError),
}

impl From<SceneError> for AppError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::OutsideRouter => Self::OutsideRouter,
            other => Self::Core(other),
        }
    }
}

impl AppError {
    /// Create an invalid route error
    #[inline]
    #[must_use]
    pub fn invalid_route(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error stems from how the app was assembled
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        match self {
            Self::OutsideRouter | Self::InvalidRoute { .. } => true,
            Self::Core(err) => err.is_structural(),
            Self::Variable(_) => false,
        }
    }

    /// Check if a host can retry or surface the error without rebuilding the app
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Variable(err) => err.is_recoverable(),
            Self::Core(err) => err.is_recoverable(),
            Self::OutsideRouter | Self::InvalidRoute { .. } => false,
        }
    }
}

/// Result alias for app operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_router_maps_to_app_variant() {
        let err: AppError = SceneError::OutsideRouter.into();
        assert_eq!(err, AppError::OutsideRouter);
        assert!(err.is_structural());
        assert_eq!(
            err.to_string(),
            "Invariant failed: You should not use <Switch> outside a <Router>"
        );
    }

    #[test]
    fn other_core_errors_are_wrapped() {
        let err: AppError = SceneError::Cancelled.into();
        assert!(matches!(err, AppError::Core(SceneError::Cancelled)));
        assert!(!err.is_structural());
    }
}
