//! Error types for variables and variable sets

use scenes_core::SceneError;

/// Main variable subsystem error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// The option source failed
    #[error("variable '{name}' could not load options: {reason}")]
    OptionsFetch {
        /// Variable name
        name: String,
        /// Failure description
        reason: String,
    },

    /// Variables in a set reference each other in a loop
    #[error("dependency cycle between variables: {}", names.join(" -> "))]
    DependencyCycle {
        /// Names taking part in the cycle
        names: Vec<String>,
    },

    /// Name collides with a macro
    #[error("'{0}' is a reserved macro name")]
    ReservedName(String),

    /// Two variables of one set share a name
    #[error("variable '{0}' is declared twice in the same set")]
    DuplicateName(String),

    /// Resolution superseded or torn down before finishing
    #[error("variable resolution cancelled")]
    Cancelled,

    /// Error from the scene graph
    #[error(transparent)]
    Core(#[from] SceneError),
}

impl VariableError {
    /// Check if retrying the resolution may succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::OptionsFetch { .. } | Self::Cancelled => true,
            Self::Core(err) => err.is_recoverable(),
            _ => false,
        }
    }

    /// Check if the set was declared incorrectly
    #[inline]
    #[must_use]
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::DependencyCycle { .. } | Self::ReservedName(_) | Self::DuplicateName(_)
        )
    }
}

impl From<VariableError> for SceneError {
    fn from(err: VariableError) -> Self {
        match err {
            VariableError::Core(inner) => inner,
            VariableError::Cancelled => SceneError::Cancelled,
            VariableError::OptionsFetch { name, reason } => {
                SceneError::VariableUpdate { name, reason }
            }
            other => SceneError::InvalidState(other.to_string()),
        }
    }
}

/// Result alias for variable operations
pub type VariableResult<T> = Result<T, VariableError>;
