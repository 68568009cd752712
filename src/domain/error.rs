use serde_json::Value;
use thiserror::Error;

/// Message shown whenever a failure cannot be attributed to a provider-native error.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Full name is required")]
    EmptyFullName,

    #[error("Email is required")]
    EmptyEmail,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password is required")]
    EmptyPassword,

    #[error("Gender is required")]
    MissingGender,

    #[error("Unknown gender: {0}")]
    InvalidGender(String),

    #[error("Selected image is empty")]
    EmptyAvatar,
}

/// Failure reported by one of the external collaborators.
///
/// Adapters normalise whatever the remote side sent into one of these shapes,
/// so call sites never poke at ad hoc fields.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider-native error carrying a human readable message.
    #[error("{message}")]
    Structured {
        message: String,
        code: Option<String>,
    },

    /// The provider answered with something that is not a recognisable error object.
    #[error("unrecognised error payload: {0}")]
    Payload(Value),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    pub fn structured(message: impl Into<String>) -> Self {
        Self::Structured {
            message: message.into(),
            code: None,
        }
    }

    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    /// Message that may be shown to the user verbatim, if the error has one.
    pub fn user_message(&self) -> Option<&str> {
        let message = match self {
            Self::Structured { message, .. } => Some(message.as_str()),
            Self::Payload(value) => value.get("message").and_then(Value::as_str),
            Self::Transport(_) => None,
        };
        message.map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Phase-tagged failure of the provisioning pipeline.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Identity phase failed: {0}")]
    Identity(#[source] ProviderError),

    #[error("Avatar upload failed: {0}")]
    AssetUpload(#[source] ProviderError),

    #[error("Profile insert failed: {0}")]
    Persistence(#[source] ProviderError),
}

/// Closed set of error categories a user-facing failure can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Identity,
    AssetUpload,
    Persistence,
    Unexpected,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity_error",
            Self::AssetUpload => "asset_upload_error",
            Self::Persistence => "persistence_error",
            Self::Unexpected => "unexpected_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ProvisioningError {
    /// Maps any pipeline failure to a category and a non-empty user message.
    pub fn classify(&self) -> ClassifiedError {
        let (category, source) = match self {
            Self::Identity(e) => (ErrorCategory::Identity, e),
            Self::AssetUpload(e) => (ErrorCategory::AssetUpload, e),
            Self::Persistence(e) => (ErrorCategory::Persistence, e),
        };

        match source.user_message() {
            Some(message) => ClassifiedError {
                category,
                message: message.to_string(),
            },
            None => ClassifiedError::unexpected(),
        }
    }
}

impl ClassifiedError {
    fn unexpected() -> Self {
        Self {
            category: ErrorCategory::Unexpected,
            message: UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }
}
