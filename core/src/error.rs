use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Engine-level error taxonomy. `protocol::error::ToolError` maps
/// each variant onto the wire-level `{code, details}` shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("a dependency cycle would be introduced: {0}")]
    CycleDetected(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        OrchestratorError::NotFound(kind, id.to_string())
    }

    pub fn empty_field(field: &str) -> Self {
        OrchestratorError::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_, _))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OrchestratorError::Validation(_))
    }

    /// String code carried in the wire envelope's `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::NotFound(_, _) => "RESOURCE_NOT_FOUND",
            OrchestratorError::Validation(_) => "VALIDATION_ERROR",
            OrchestratorError::Conflict(_) | OrchestratorError::CycleDetected(_) => "CONFLICT",
            OrchestratorError::Database(_) => "DATABASE_ERROR",
            OrchestratorError::Configuration(_) | OrchestratorError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}
