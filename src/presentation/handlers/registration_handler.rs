use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        error::{DomainError, ErrorCategory, UNEXPECTED_ERROR_MESSAGE},
        models::{outcome::PipelineOutcome, profile::ProfileRecord, registration::Avatar},
        repositories::profile_repository::ProfileRepository,
        services::{
            clock::SubmissionClock, identity_provider::IdentityProvider, object_store::ObjectStore,
        },
    },
    usecase::{
        provision_account_usecase::ProvisionAccountUsecase,
        registration_form::{FormFields, RegistrationForm, StatusReport, SubmissionRejected},
    },
};

// Request

/// Image picked in the form, base64 encoded
#[derive(Serialize, Deserialize)]
pub struct AvatarPayload {
    pub filename: String,
    pub content_base64: String,
}

/// json for one-shot register request
#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub avatar: Option<AvatarPayload>,
}

/// json for updating the text fields of a form
#[derive(Serialize, Deserialize)]
pub struct FieldsRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
}

impl From<FieldsRequest> for FormFields {
    fn from(request: FieldsRequest) -> Self {
        Self {
            full_name: request.full_name,
            email: request.email,
            password: request.password,
            gender: request.gender,
        }
    }
}

// Response

#[derive(Serialize, Deserialize)]
pub struct FormCreatedResponse {
    pub form_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormStatusResponse {
    pub state: String,
    pub message: Option<String>,
    pub busy: bool,
    pub preview: Option<String>,
}

impl From<StatusReport> for FormStatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            state: report.state.to_string(),
            message: report.message,
            busy: report.busy,
            preview: report.preview,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub gender: String,
    pub avatar_url: Option<String>,
}

impl From<ProfileRecord> for ProfileInfo {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            id: profile.id.to_string(),
            full_name: profile.full_name,
            email: profile.email,
            gender: profile.gender.to_string(),
            avatar_url: profile.avatar_url,
        }
    }
}

/// Exactly one terminal message, success or error
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub status: String,
    pub message: String,
    pub category: Option<String>,
    pub profile: Option<ProfileInfo>,
}

impl SubmissionResponse {
    fn error(message: String, category: Option<ErrorCategory>) -> Self {
        Self {
            status: "error".to_string(),
            message,
            category: category.map(|c| c.as_str().to_string()),
            profile: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Registration form not found")]
    FormNotFound,

    #[error("Avatar content is not valid base64")]
    InvalidAvatarEncoding,

    #[error("{}", .0.message())]
    Rejected(SubmissionRejected),

    #[error("{0}")]
    Invalid(#[from] DomainError),

    #[error("Too many registration forms are open. Please try again later.")]
    TooManyForms,

    #[error("{}", UNEXPECTED_ERROR_MESSAGE)]
    SubmissionAborted,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::FormNotFound => StatusCode::NOT_FOUND,
            ApiError::Rejected(SubmissionRejected::Busy) => StatusCode::CONFLICT,
            ApiError::InvalidAvatarEncoding
            | ApiError::Rejected(SubmissionRejected::Invalid(_))
            | ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyForms => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::SubmissionAborted => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let category = match &self {
            ApiError::SubmissionAborted => Some(ErrorCategory::Unexpected),
            _ => None,
        };

        (status, Json(SubmissionResponse::error(self.to_string(), category))).into_response()
    }
}

fn outcome_response(outcome: PipelineOutcome) -> Response {
    match outcome {
        PipelineOutcome::Success { message, profile } => {
            let status = if profile.is_some() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = SubmissionResponse {
                status: "success".to_string(),
                message,
                category: None,
                profile: profile.map(ProfileInfo::from),
            };
            (status, Json(body)).into_response()
        }
        PipelineOutcome::Recoverable { message } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SubmissionResponse::error(message, None)),
        )
            .into_response(),
        PipelineOutcome::Fatal { category, message } => {
            let status = match category {
                ErrorCategory::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(SubmissionResponse::error(message, Some(category)))).into_response()
        }
    }
}

fn decode_avatar(payload: AvatarPayload) -> Result<Avatar, ApiError> {
    let bytes = STANDARD
        .decode(payload.content_base64.trim())
        .map_err(|_| ApiError::InvalidAvatarEncoding)?;
    Ok(Avatar::new(payload.filename, bytes)?)
}

type SharedForm = Arc<Mutex<RegistrationForm>>;

/// How long an untouched form is kept and how many may be open at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormLimits {
    pub idle_ttl: Duration,
    pub max_open: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_open: 1000,
        }
    }
}

struct FormEntry {
    form: SharedForm,
    touched: Instant,
}

impl FormEntry {
    fn is_expired(&self, now: Instant, idle_ttl: Duration) -> bool {
        if now.duration_since(self.touched) < idle_ttl {
            return false;
        }
        // locked or submitting forms are still in use
        match self.form.try_lock() {
            Ok(form) => !form.is_busy(),
            Err(_) => false,
        }
    }
}

/// Live form instances, one per browser session
pub struct FormRegistry {
    forms: RwLock<HashMap<Uuid, FormEntry>>,
    limits: FormLimits,
}

impl FormRegistry {
    pub fn new(limits: FormLimits) -> Self {
        Self {
            forms: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Opens a new form after dropping the ones left idle past the TTL.
    async fn create(&self) -> Result<Uuid, ApiError> {
        let now = Instant::now();
        let mut forms = self.forms.write().await;

        let before = forms.len();
        forms.retain(|_, entry| !entry.is_expired(now, self.limits.idle_ttl));
        let expired = before - forms.len();
        if expired > 0 {
            info!(expired, "expired idle registration forms");
        }

        if forms.len() >= self.limits.max_open {
            warn!(open = forms.len(), "registration form limit reached");
            return Err(ApiError::TooManyForms);
        }

        let id = Uuid::new_v4();
        forms.insert(
            id,
            FormEntry {
                form: Arc::new(Mutex::new(RegistrationForm::new())),
                touched: now,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: &Uuid) -> Result<SharedForm, ApiError> {
        let mut forms = self.forms.write().await;
        let entry = forms.get_mut(id).ok_or(ApiError::FormNotFound)?;
        entry.touched = Instant::now();
        Ok(Arc::clone(&entry.form))
    }

    async fn remove(&self, id: &Uuid) -> Result<(), ApiError> {
        self.forms
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::FormNotFound)
    }
}

/* Router Function and Handler Function */

/// function return Router object
/// Suppose to be nested by main router
pub fn create_registration_router<I, S, R, C>(
    usecase: ProvisionAccountUsecase<I, S, R, C>,
    limits: FormLimits,
) -> Router
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let state = AppState {
        usecase: Arc::new(usecase),
        forms: Arc::new(FormRegistry::new(limits)),
    };

    Router::new()
        .route("/register", post(register::<I, S, R, C>))
        .route("/forms", post(create_form::<I, S, R, C>))
        .route(
            "/forms/{id}",
            put(update_fields::<I, S, R, C>)
                .get(form_status::<I, S, R, C>)
                .delete(discard_form::<I, S, R, C>),
        )
        .route(
            "/forms/{id}/avatar",
            put(select_avatar::<I, S, R, C>).delete(clear_avatar::<I, S, R, C>),
        )
        .route("/forms/{id}/submit", post(submit_form::<I, S, R, C>))
        .with_state(state)
}

pub struct AppState<I, S, R, C>
where
    I: IdentityProvider,
    S: ObjectStore,
    R: ProfileRepository,
    C: SubmissionClock,
{
    pub usecase: Arc<ProvisionAccountUsecase<I, S, R, C>>,
    pub forms: Arc<FormRegistry>,
}

impl<I, S, R, C> Clone for AppState<I, S, R, C>
where
    I: IdentityProvider,
    S: ObjectStore,
    R: ProfileRepository,
    C: SubmissionClock,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            forms: Arc::clone(&self.forms),
        }
    }
}

/// Runs one submission against a shared form; the lock is never held across the pipeline.
///
/// The pipeline runs on its own task: once started it always reaches
/// `finish_submission`, even if the client goes away.
async fn run_submission<I, S, R, C>(
    usecase: Arc<ProvisionAccountUsecase<I, S, R, C>>,
    form: SharedForm,
) -> Result<Response, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let input = form
        .lock()
        .await
        .begin_submission()
        .map_err(ApiError::Rejected)?;

    let task_form = Arc::clone(&form);
    let pipeline = tokio::spawn(async move {
        let outcome = usecase.submit(input).await;
        task_form.lock().await.finish_submission(&outcome);
        outcome
    });

    match pipeline.await {
        Ok(outcome) => Ok(outcome_response(outcome)),
        Err(e) => {
            error!(error = %e, "submission task did not complete");
            form.lock().await.finish_submission(&PipelineOutcome::Fatal {
                category: ErrorCategory::Unexpected,
                message: UNEXPECTED_ERROR_MESSAGE.to_string(),
            });
            Err(ApiError::SubmissionAborted)
        }
    }
}

// handler function

/// handler function for one-shot register
async fn register<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let mut form = RegistrationForm::new();
    form.set_fields(FormFields {
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
        gender: payload.gender,
    });
    if let Some(avatar) = payload.avatar {
        form.select_avatar(decode_avatar(avatar)?);
    }

    let usecase = Arc::clone(&state.usecase);
    let pipeline = tokio::spawn(async move { form.submit(&*usecase).await });
    match pipeline.await {
        Ok(outcome) => Ok(outcome_response(outcome)),
        Err(e) => {
            error!(error = %e, "registration task did not complete");
            Err(ApiError::SubmissionAborted)
        }
    }
}

/// handler function for opening a new form
async fn create_form<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
) -> Result<impl IntoResponse, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form_id = state.forms.create().await?;
    info!(%form_id, "registration form opened");
    Ok((StatusCode::CREATED, Json(FormCreatedResponse { form_id })))
}

/// handler function for the status reporter
async fn form_status<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FormStatusResponse>, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form = state.forms.get(&id).await?;
    let report = form.lock().await.status();
    Ok(Json(report.into()))
}

async fn update_fields<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FieldsRequest>,
) -> Result<Json<FormStatusResponse>, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form = state.forms.get(&id).await?;
    let mut form = form.lock().await;
    if form.is_busy() {
        return Err(ApiError::Rejected(SubmissionRejected::Busy));
    }
    form.set_fields(payload.into());
    Ok(Json(form.status().into()))
}

async fn select_avatar<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AvatarPayload>,
) -> Result<Json<FormStatusResponse>, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let avatar = decode_avatar(payload)?;
    let form = state.forms.get(&id).await?;
    let mut form = form.lock().await;
    if form.is_busy() {
        return Err(ApiError::Rejected(SubmissionRejected::Busy));
    }
    form.select_avatar(avatar);
    Ok(Json(form.status().into()))
}

async fn clear_avatar<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FormStatusResponse>, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form = state.forms.get(&id).await?;
    let mut form = form.lock().await;
    if form.is_busy() {
        return Err(ApiError::Rejected(SubmissionRejected::Busy));
    }
    form.clear_avatar();
    Ok(Json(form.status().into()))
}

async fn submit_form<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form = state.forms.get(&id).await?;
    run_submission(Arc::clone(&state.usecase), form).await
}

async fn discard_form<I, S, R, C>(
    State(state): State<AppState<I, S, R, C>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: ObjectStore + Send + Sync + 'static,
    R: ProfileRepository + Send + Sync + 'static,
    C: SubmissionClock + Send + Sync + 'static,
{
    let form = state.forms.get(&id).await?;
    if form.lock().await.is_busy() {
        return Err(ApiError::Rejected(SubmissionRejected::Busy));
    }
    state.forms.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
