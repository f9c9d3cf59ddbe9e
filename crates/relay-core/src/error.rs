//! Error types for relay-core.

use thiserror::Error;

/// Result type for relay-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to callers of the engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Script source could not be compiled.
    #[error("compile error in {name}: {message}")]
    Compile {
        name: String,
        message: String,
        /// Line of the offending token, when known.
        line: Option<usize>,
    },

    /// The program failed while running, including failures raised by a capability.
    #[error("execution error: {message}")]
    Execution {
        message: String,
        /// The capability failure that aborted the call, if any.
        cause: Option<CapabilityError>,
    },

    /// The call's deadline elapsed or its context was cancelled.
    #[error("execution timed out")]
    Timeout,

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,
}

impl Error {
    pub(crate) fn execution(message: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
            cause: None,
        }
    }

    /// The capability failure behind an execution error.
    pub fn capability(&self) -> Option<&CapabilityError> {
        match self {
            Error::Execution { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Render the error together with a short recovery hint for terminal users.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Compile { .. } => "fix the script and run `relay check` again",
            Error::Execution {
                cause: Some(CapabilityError::Argument(_)),
                ..
            } => "check the arguments passed to the capability call",
            Error::Execution {
                cause: Some(CapabilityError::Load { .. }),
                ..
            } => "make sure the model locator is reachable",
            Error::Execution {
                cause: Some(CapabilityError::Parse { .. }),
                ..
            } => "the model document must be a PMML TreeModel",
            Error::Execution {
                cause: Some(CapabilityError::Evaluation(_)),
                ..
            } => "make sure every feature used by the model is supplied",
            Error::Execution { .. } => "inspect the script for the failing statement",
            Error::Timeout => "raise --timeout-ms or reduce the work done per call",
            Error::Closed => "construct a new engine",
        };
        format!("{self}\n  hint: {hint}")
    }
}

/// Failures raised by host capabilities inside a running script.
///
/// These abort only the current call and surface as [`Error::Execution`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// Wrong arity or argument type.
    #[error("argument error: {0}")]
    Argument(String),

    /// The resource could not be fetched.
    #[error("failed to load {locator}: {message}")]
    Load { locator: String, message: String },

    /// The fetched resource is not a valid model.
    #[error("failed to parse {locator}: {message}")]
    Parse { locator: String, message: String },

    /// The model could not be evaluated against the given features.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The call was cancelled while the capability was running.
    #[error("cancelled")]
    Cancelled,
}
