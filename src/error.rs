//! Error taxonomy for the storefront client.
//!
//! - `ValidationError`: rejected locally, before anything goes on the wire.
//! - `ApiError`: transport/server failures plus the global unauthorized case.
//! - `StoreError`: durable token storage failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Stored token is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Quantity must be greater than 0")]
    QuantityNotPositive,

    #[error("Only {available} items available in stock")]
    InsufficientStock { available: u32 },

    #[error("Name is required")]
    NameRequired,

    #[error("Category is required")]
    CategoryRequired,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Price must be greater than 0")]
    PriceNotPositive,

    #[error("Quantity must be 0 or greater")]
    QuantityNegative,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 from the server. The token has already been cleared by the time the caller sees this.
    #[error("{}", .message.as_deref().unwrap_or("Session expired, please log in again"))]
    Unauthorized { message: Option<String> },

    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid sweet id: {0:?}")]
    InvalidId(String),

    #[error("Invalid API base URL {0:?}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Server-provided message when there is one, the caller's fallback otherwise.
    /// Local validation messages always win since they are already user-facing.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Server { message: Some(m), .. }
            | ApiError::Unauthorized { message: Some(m) } => m.clone(),
            ApiError::Validation(v) => v.to_string(),
            ApiError::Forbidden | ApiError::NotFound(_) | ApiError::InvalidId(_) => self.to_string(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}
