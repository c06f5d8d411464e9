use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnderwriteError {
    /// Rejected at the boundary, before any computation ran.
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (residual: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl UnderwriteError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        UnderwriteError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Checked arithmetic left the Decimal range.
    pub(crate) fn overflow(what: impl std::fmt::Display) -> Self {
        UnderwriteError::FinancialImpossibility(format!("{what} exceeds Decimal range"))
    }

    /// Qualify the offending field with where it came from, e.g.
    /// `scenario:Bear vacancy_pct`. Other variants pass through.
    pub fn with_field_prefix(self, prefix: &str) -> Self {
        match self {
            UnderwriteError::InvalidInput { field, reason } => UnderwriteError::InvalidInput {
                field: format!("{prefix} {field}"),
                reason,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for UnderwriteError {
    fn from(e: serde_json::Error) -> Self {
        UnderwriteError::SerializationError(e.to_string())
    }
}
