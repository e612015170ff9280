pub mod cache;
pub mod config;
pub mod error;
pub mod numerical;
pub mod types;

#[cfg(feature = "risk")]
pub mod risk;

#[cfg(feature = "stress")]
pub mod stress;

#[cfg(feature = "attribution")]
pub mod attribution;

#[cfg(feature = "statistics")]
pub mod statistics;

#[cfg(feature = "forecasting")]
pub mod forecasting;

pub use config::EngineConfig;
pub use error::AnalyticsError;
pub use numerical::NumericalCore;
pub use types::*;

/// Standard result type for all analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
