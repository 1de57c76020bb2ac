//! Central error taxonomy for the detector.
//!
//! Every fallible boundary in this crate returns a `DetectorError` so that
//! logging, metrics, and the gate cascade's fail-open/fail-closed decisions
//! can all classify failures the same way.

use thiserror::Error;

/// High-level error categories for metrics and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Stream ingestion (websocket, subscription) errors.
    Ingestion,
    /// Market-data / chain-RPC provider errors.
    Provider,
    /// Persistent store errors.
    Store,
    /// Configuration errors.
    Configuration,
    /// Data validation errors.
    Validation,
    /// Signal gate cascade errors.
    Gate,
    /// Internal system errors.
    System,
}

impl ErrorCategory {
    /// Get the metric label for this category.
    pub fn metric_label(&self) -> &'static str {
        match self {
            ErrorCategory::Ingestion => "ingestion",
            ErrorCategory::Provider => "provider",
            ErrorCategory::Store => "store",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Gate => "gate",
            ErrorCategory::System => "system",
        }
    }
}

/// Standardized error types with context and categorization.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("ingestion error: {message}")]
    Ingestion {
        message: String,
        source: Option<anyhow::Error>,
    },

    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: String,
        message: String,
        source: Option<anyhow::Error>,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
        source: Option<anyhow::Error>,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("gate error at stage {stage}: {message}")]
    Gate { stage: String, message: String },

    #[error("system error: {message}")]
    System {
        message: String,
        source: Option<anyhow::Error>,
    },
}

impl DetectorError {
    /// Get the error category for metrics/classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DetectorError::Ingestion { .. } => ErrorCategory::Ingestion,
            DetectorError::Provider { .. } => ErrorCategory::Provider,
            DetectorError::Store { .. } => ErrorCategory::Store,
            DetectorError::Configuration { .. } => ErrorCategory::Configuration,
            DetectorError::Validation { .. } => ErrorCategory::Validation,
            DetectorError::Gate { .. } => ErrorCategory::Gate,
            DetectorError::System { .. } => ErrorCategory::System,
        }
    }

    pub fn ingestion<S: Into<String>>(message: S) -> Self {
        Self::Ingestion {
            message: message.into(),
            source: None,
        }
    }

    pub fn ingestion_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Ingestion {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn provider<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn provider_with_source<P: Into<String>, S: Into<String>>(
        provider: P,
        message: S,
        source: anyhow::Error,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    pub fn store_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn gate<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::Gate {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
            source: None,
        }
    }

    pub fn system_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::System {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Extension trait to easily categorize and convert anyhow errors.
pub trait ErrorContext {
    fn ingestion_context<S: Into<String>>(self, message: S) -> DetectorError;
    fn provider_context<P: Into<String>, S: Into<String>>(
        self,
        provider: P,
        message: S,
    ) -> DetectorError;
    fn store_context<S: Into<String>>(self, message: S) -> DetectorError;
    fn system_context<S: Into<String>>(self, message: S) -> DetectorError;
}

impl ErrorContext for anyhow::Error {
    fn ingestion_context<S: Into<String>>(self, message: S) -> DetectorError {
        DetectorError::ingestion_with_source(message, self)
    }

    fn provider_context<P: Into<String>, S: Into<String>>(
        self,
        provider: P,
        message: S,
    ) -> DetectorError {
        DetectorError::provider_with_source(provider, message, self)
    }

    fn store_context<S: Into<String>>(self, message: S) -> DetectorError {
        DetectorError::store_with_source(message, self)
    }

    fn system_context<S: Into<String>>(self, message: S) -> DetectorError {
        DetectorError::system_with_source(message, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn error_categorization() {
        let err = DetectorError::ingestion("subscription dropped");
        assert_eq!(err.category(), ErrorCategory::Ingestion);
        assert_eq!(err.category().metric_label(), "ingestion");

        let config_err = DetectorError::config("missing stream_url");
        assert_eq!(config_err.category(), ErrorCategory::Configuration);

        let gate_err = DetectorError::gate("safety", "top10_ratio unknown");
        assert_eq!(gate_err.category(), ErrorCategory::Gate);
    }

    #[test]
    fn error_context_extension() {
        let base_error = anyhow!("connection reset");
        let categorized = base_error.provider_context("dexscreener", "failed to fetch pair");

        assert_eq!(categorized.category(), ErrorCategory::Provider);
        assert!(categorized.to_string().contains("provider error"));
        assert!(categorized.to_string().contains("dexscreener"));
    }
}
