use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::{
    domain::{
        error::DomainError,
        models::{
            outcome::PipelineOutcome,
            registration::{Avatar, EmailAddress, Gender, Password, RegistrationInput},
        },
        repositories::profile_repository::ProfileRepository,
        services::{
            clock::SubmissionClock, identity_provider::IdentityProvider, object_store::ObjectStore,
        },
    },
    usecase::{avatar_preview::render_preview, provision_account_usecase::ProvisionAccountUsecase},
};

pub const SUBMISSION_IN_PROGRESS_MESSAGE: &str =
    "A registration is already in progress. Please wait.";

/// Raw text fields as typed by the user
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
}

impl fmt::Debug for FormFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFields")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("password", &"***")
            .field("gender", &self.gender)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Succeeded(String),
    Failed(String),
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Submitted,
    /// Fields did not validate; nothing was sent anywhere.
    Rejected(String),
    Completed(PipelineOutcome),
}

/// The only way a form's submission state changes.
///
/// While `Submitting`, everything except the pipeline's own completion is ignored.
pub fn transition(state: &SubmissionState, event: &SubmissionEvent) -> SubmissionState {
    match (state, event) {
        (SubmissionState::Submitting, SubmissionEvent::Completed(outcome)) => match outcome {
            PipelineOutcome::Success { message, .. } => SubmissionState::Succeeded(message.clone()),
            PipelineOutcome::Recoverable { message } | PipelineOutcome::Fatal { message, .. } => {
                SubmissionState::Failed(message.clone())
            }
        },
        (SubmissionState::Submitting, _) => SubmissionState::Submitting,
        (_, SubmissionEvent::Submitted) => SubmissionState::Submitting,
        (_, SubmissionEvent::Rejected(message)) => SubmissionState::Failed(message.clone()),
        (other, SubmissionEvent::Completed(_)) => other.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionRejected {
    Busy,
    Invalid(DomainError),
}

impl SubmissionRejected {
    pub fn message(&self) -> String {
        match self {
            Self::Busy => SUBMISSION_IN_PROGRESS_MESSAGE.to_string(),
            Self::Invalid(e) => e.to_string(),
        }
    }

    pub fn into_outcome(self) -> PipelineOutcome {
        PipelineOutcome::Recoverable {
            message: self.message(),
        }
    }
}

/// What the view shows for a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: &'static str,
    pub message: Option<String>,
    pub busy: bool,
    pub preview: Option<String>,
}

/// One registration form instance: its fields, picked image, preview and submission state
#[derive(Debug, Default)]
pub struct RegistrationForm {
    fields: FormFields,
    avatar: Option<Avatar>,
    preview: Option<String>,
    state: SubmissionState,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn set_fields(&mut self, fields: FormFields) {
        self.fields = fields;
    }

    pub fn select_avatar(&mut self, avatar: Avatar) {
        self.preview = Some(render_preview(&avatar));
        self.avatar = Some(avatar);
    }

    pub fn clear_avatar(&mut self) {
        self.avatar = None;
        self.preview = None;
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == SubmissionState::Submitting
    }

    pub fn validate(&self) -> Result<RegistrationInput, DomainError> {
        let email = EmailAddress::new(self.fields.email.as_str())?;
        let password = Password::new(self.fields.password.as_str())?;
        let gender: Gender = self.fields.gender.parse()?;
        RegistrationInput::new(
            self.fields.full_name.as_str(),
            email,
            password,
            gender,
            self.avatar.clone(),
        )
    }

    /// Claims the form for one submission and hands back the validated input.
    pub fn begin_submission(&mut self) -> Result<RegistrationInput, SubmissionRejected> {
        if self.is_busy() {
            warn!("submission ignored, form is busy");
            return Err(SubmissionRejected::Busy);
        }

        match self.validate() {
            Ok(input) => {
                self.apply(SubmissionEvent::Submitted);
                Ok(input)
            }
            Err(e) => {
                self.apply(SubmissionEvent::Rejected(e.to_string()));
                Err(SubmissionRejected::Invalid(e))
            }
        }
    }

    pub fn finish_submission(&mut self, outcome: &PipelineOutcome) {
        self.apply(SubmissionEvent::Completed(outcome.clone()));
        if outcome.is_success() {
            self.fields = FormFields::default();
            self.clear_avatar();
        }
    }

    /// Runs the whole submission for a form owned by the caller.
    pub async fn submit<I, S, R, C>(
        &mut self,
        usecase: &ProvisionAccountUsecase<I, S, R, C>,
    ) -> PipelineOutcome
    where
        I: IdentityProvider + Send + Sync,
        S: ObjectStore + Send + Sync,
        R: ProfileRepository + Send + Sync,
        C: SubmissionClock + Send + Sync,
    {
        let input = match self.begin_submission() {
            Ok(input) => input,
            Err(rejected) => return rejected.into_outcome(),
        };
        let outcome = usecase.submit(input).await;
        self.finish_submission(&outcome);
        outcome
    }

    pub fn status(&self) -> StatusReport {
        let message = match &self.state {
            SubmissionState::Succeeded(m) | SubmissionState::Failed(m) => Some(m.clone()),
            SubmissionState::Idle | SubmissionState::Submitting => None,
        };
        StatusReport {
            state: self.state.name(),
            message,
            busy: self.is_busy(),
            preview: self.preview.clone(),
        }
    }

    fn apply(&mut self, event: SubmissionEvent) {
        self.state = transition(&self.state, &event);
    }
}
