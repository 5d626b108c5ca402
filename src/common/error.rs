//! Error handling for the scalar expression core

use thiserror::Error;

/// Main error type for expression construction and evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrismDBError {
    #[error("Function '{0}' does not exist")]
    FunctionNotFound(String),

    #[error("Return type cannot be absent for scalar function '{0}'")]
    MissingReturnType(String),

    /// A function implementation (or cast rebuild) refused its arguments
    #[error("Failed to build function '{function}': {source}")]
    ArgumentConstruction {
        function: String,
        #[source]
        source: Box<PrismDBError>,
    },

    /// A per-type-class evaluator failed
    #[error("Failed to evaluate '{function}': {source}")]
    Evaluation {
        function: String,
        #[source]
        source: Box<PrismDBError>,
    },

    /// Any other failure annotated with where it happened
    #[error("{context}: {source}")]
    Traced {
        context: String,
        #[source]
        source: Box<PrismDBError>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Cast error: {0}")]
    Cast(String),

    #[error("Overflow: {0}")]
    Overflow(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrismDBError {
    /// Wrap a factory failure with the name of the function being built
    pub fn argument_construction(function: impl Into<String>, source: PrismDBError) -> Self {
        PrismDBError::ArgumentConstruction {
            function: function.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an evaluator failure with the expression that produced it
    pub fn evaluation(function: impl Into<String>, source: PrismDBError) -> Self {
        PrismDBError::Evaluation {
            function: function.into(),
            source: Box::new(source),
        }
    }

    /// Annotate an error with the location it passed through
    pub fn traced(context: impl Into<String>, source: PrismDBError) -> Self {
        PrismDBError::Traced {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping every context wrapper
    pub fn root_cause(&self) -> &PrismDBError {
        match self {
            PrismDBError::ArgumentConstruction { source, .. }
            | PrismDBError::Evaluation { source, .. }
            | PrismDBError::Traced { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PrismDBError>;

/// Result type alias for PrismDB operations (alias for Result)
pub type PrismDBResult<T> = std::result::Result<T, PrismDBError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_err {
    ($msg:expr) => {
        $crate::common::error::PrismDBError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PrismDBError::Internal(format!($fmt, $($arg)*))
    };
}

/// Macro for creating type errors
#[macro_export]
macro_rules! type_err {
    ($msg:expr) => {
        $crate::common::error::PrismDBError::Type($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PrismDBError::Type(format!($fmt, $($arg)*))
    };
}
