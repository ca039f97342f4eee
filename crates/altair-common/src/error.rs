//! Error types for the catalog middleware.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using CatalogError.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Primary error type for connector, walker and registry operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    // === Transport Errors ===
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Connector {connector} did not answer within {after:?}")]
    ConnectorTimeout { connector: String, after: Duration },

    // === Data Errors ===
    #[error("Failed to parse response: {0}")]
    Parse(String),

    // === Access Errors ===
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    // === Registry Errors ===
    #[error("Connector not found: {0}")]
    NotFound(String),

    #[error("Connector already registered: {0}")]
    DuplicateId(String),

    // === Caller Errors ===
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl CatalogError {
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        CatalogError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// True for transport failures and timeouts.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CatalogError::Network { .. }
                | CatalogError::Timeout { .. }
                | CatalogError::ConnectorTimeout { .. }
        )
    }

    /// Short machine-friendly classification, used in status summaries and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Network { .. } => "network",
            CatalogError::Timeout { .. } | CatalogError::ConnectorTimeout { .. } => "timeout",
            CatalogError::Parse(_) => "parse",
            CatalogError::AuthRequired(_) => "auth_required",
            CatalogError::Auth(_) => "auth",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::DuplicateId(_) => "duplicate_id",
            CatalogError::InvalidQuery(_) => "invalid_query",
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(format!("JSON error: {}", err))
    }
}
