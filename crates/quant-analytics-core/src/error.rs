use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Insufficient data in {method}: {reason}")]
    InsufficientData { method: String, reason: String },

    #[error("Invalid input in {method}: {field}: {reason}")]
    InvalidInput {
        method: String,
        field: String,
        reason: String,
    },

    #[error("Degenerate computation in {context}: {reason}")]
    ComputationDegenerate { context: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AnalyticsError {
    pub fn insufficient(method: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::InsufficientData {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(method: &str, field: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidInput {
            method: method.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn degenerate(context: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::ComputationDegenerate {
            context: context.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::SerializationError(e.to_string())
    }
}
