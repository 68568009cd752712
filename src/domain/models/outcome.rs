use crate::domain::{error::ErrorCategory, models::profile::ProfileRecord};

pub const REGISTERED_MESSAGE: &str = "Registration successful! Welcome to your food diary.";
pub const CONFIRMATION_PENDING_MESSAGE: &str =
    "Registration received. Please check your email to confirm your account.";

/// Terminal result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// `profile` is absent when the account still awaits confirmation.
    Success {
        message: String,
        profile: Option<ProfileRecord>,
    },
    /// Rejected before any collaborator was called; the user can fix it and resubmit.
    Recoverable { message: String },
    Fatal {
        category: ErrorCategory,
        message: String,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::Recoverable { message }
            | Self::Fatal { message, .. } => message,
        }
    }
}
