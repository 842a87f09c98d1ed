//! Typed error hierarchy for the sandbox facade.

use scriptbox_core::SessionError;

/// Errors raised by the sandbox facade.
///
/// Script-level failures (syntax errors, runtime errors, tool errors) are
/// never raised; they come back as data on
/// [`EvalResult`](crate::EvalResult). What is raised falls in two groups:
/// host-policy violations the caller must distinguish (`Timeout`,
/// `MemoryLimit`) and API misuse (`Closed`, `TooManyTools`).
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The wall-clock budget was exhausted mid-eval. The sandbox stays
    /// usable; the offending eval's effects up to the interrupt persist.
    #[error("{message}")]
    Timeout { message: String },

    /// The interpreter heap cap was hit mid-eval. The sandbox stays usable.
    #[error("{message}")]
    MemoryLimit { message: String },

    /// The sandbox was closed and cannot evaluate again.
    #[error("sandbox is closed")]
    Closed,

    /// More than [`MAX_TOOL_FUNCTIONS`](scriptbox_core::MAX_TOOL_FUNCTIONS)
    /// distinct tool names registered.
    #[error("too many tool functions (max {max})")]
    TooManyTools { max: usize },

    /// The embedded interpreter failed outside of sandboxed execution.
    #[error("interpreter error: {0}")]
    Engine(String),
}

impl SandboxError {
    /// True for the resource-limit errors, which leave the sandbox usable.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            SandboxError::Timeout { .. } | SandboxError::MemoryLimit { .. }
        )
    }
}

impl From<SessionError> for SandboxError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Closed => SandboxError::Closed,
            SessionError::TooManyTools { max } => SandboxError::TooManyTools { max },
            SessionError::Engine(message) => SandboxError::Engine(message),
        }
    }
}
