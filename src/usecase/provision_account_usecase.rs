use tracing::{error, info};

use crate::domain::{
    error::ProvisioningError,
    models::{
        asset::{StorageKey, StoredAsset},
        identity::{AccountCreation, UserId},
        outcome::{CONFIRMATION_PENDING_MESSAGE, PipelineOutcome, REGISTERED_MESSAGE},
        profile::ProfileRecord,
        registration::{Avatar, RegistrationInput},
    },
    repositories::profile_repository::ProfileRepository,
    services::{
        clock::SubmissionClock,
        identity_provider::IdentityProvider,
        object_store::{ObjectStore, UploadOptions},
    },
};

/// Where avatars go and how long clients may cache them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUploadSettings {
    pub bucket: String,
    pub cache_control: String,
}

impl Default for AvatarUploadSettings {
    fn default() -> Self {
        Self {
            bucket: "avatars".to_string(),
            cache_control: "3600".to_string(),
        }
    }
}

enum Provisioned {
    PendingConfirmation,
    Created(ProfileRecord),
}

/// Creates the identity, uploads the avatar and persists the profile, in that order.
///
/// A later phase failing does not undo earlier ones: an identity (and avatar)
/// created before a failure stays behind with no profile row.
pub struct ProvisionAccountUsecase<I, S, R, C>
where
    I: IdentityProvider,
    S: ObjectStore,
    R: ProfileRepository,
    C: SubmissionClock,
{
    identity_provider: I,
    object_store: S,
    profile_repository: R,
    clock: C,
    avatar_settings: AvatarUploadSettings,
}

impl<I, S, R, C> ProvisionAccountUsecase<I, S, R, C>
where
    I: IdentityProvider + Send + Sync,
    S: ObjectStore + Send + Sync,
    R: ProfileRepository + Send + Sync,
    C: SubmissionClock + Send + Sync,
{
    pub fn new(
        identity_provider: I,
        object_store: S,
        profile_repository: R,
        clock: C,
        avatar_settings: AvatarUploadSettings,
    ) -> Self {
        Self {
            identity_provider,
            object_store,
            profile_repository,
            clock,
            avatar_settings,
        }
    }

    pub async fn submit(&self, input: RegistrationInput) -> PipelineOutcome {
        let submitted_at = self.clock.now_millis();

        match self.provision(&input, submitted_at).await {
            Ok(Provisioned::PendingConfirmation) => {
                info!("account created, waiting for email confirmation");
                PipelineOutcome::Success {
                    message: CONFIRMATION_PENDING_MESSAGE.to_string(),
                    profile: None,
                }
            }
            Ok(Provisioned::Created(profile)) => {
                info!(user_id = %profile.id, "account provisioned");
                PipelineOutcome::Success {
                    message: REGISTERED_MESSAGE.to_string(),
                    profile: Some(profile),
                }
            }
            Err(err) => {
                let classified = err.classify();
                error!(
                    category = classified.category.as_str(),
                    error = ?err,
                    "account provisioning failed"
                );
                PipelineOutcome::Fatal {
                    category: classified.category,
                    message: classified.message,
                }
            }
        }
    }

    async fn provision(
        &self,
        input: &RegistrationInput,
        submitted_at: i64,
    ) -> Result<Provisioned, ProvisioningError> {
        // Identity
        let creation = self
            .identity_provider
            .create_account(input.email(), input.password())
            .await
            .map_err(ProvisioningError::Identity)?;

        // no user id means nothing safe to key the avatar or the profile on
        let identity = match creation {
            AccountCreation::Created(identity) => identity,
            AccountCreation::PendingConfirmation => return Ok(Provisioned::PendingConfirmation),
        };
        let user_id = identity.user_id();

        // Asset
        let avatar_url = match input.avatar() {
            Some(avatar) => Some(
                self.upload_avatar(user_id, submitted_at, avatar)
                    .await?
                    .public_url,
            ),
            None => None,
        };

        // Persistence
        let profile = ProfileRecord::new(user_id, input, avatar_url);
        self.profile_repository
            .insert(&profile)
            .await
            .map_err(ProvisioningError::Persistence)?;

        Ok(Provisioned::Created(profile))
    }

    async fn upload_avatar(
        &self,
        user_id: UserId,
        submitted_at: i64,
        avatar: &Avatar,
    ) -> Result<StoredAsset, ProvisioningError> {
        let key = StorageKey::for_avatar(user_id, submitted_at, avatar);
        let options = UploadOptions {
            cache_control: self.avatar_settings.cache_control.clone(),
            upsert: true,
            content_type: avatar.content_type().to_string(),
        };

        info!(%user_id, key = %key, size = avatar.bytes().len(), "uploading avatar");
        self.object_store
            .upload(
                &self.avatar_settings.bucket,
                &key,
                avatar.bytes().to_vec(),
                &options,
            )
            .await
            .map_err(ProvisioningError::AssetUpload)?;

        let public_url = self.object_store.public_url(&self.avatar_settings.bucket, &key);
        Ok(StoredAsset {
            path: key,
            public_url,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use rstest::*;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{
        error::{ErrorCategory, ProviderError, UNEXPECTED_ERROR_MESSAGE},
        models::{
            identity::Identity,
            registration::{EmailAddress, Gender, Password},
        },
    };

    pub const TEST_ID: &str = "00000000-0000-0000-0000-000000000001";
    pub const TEST_MILLIS: i64 = 1_760_000_000_000;

    pub fn test_user_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str(TEST_ID).unwrap())
    }

    /// How the mock identity provider answers, one entry per call
    #[derive(Clone)]
    pub enum IdentityReply {
        Created,
        Pending,
        Reject(&'static str),
        Garbage,
    }

    #[derive(Clone, Default)]
    pub struct MockIdentityProvider {
        replies: Arc<Mutex<Vec<IdentityReply>>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl MockIdentityProvider {
        pub fn replying(replies: Vec<IdentityReply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies)),
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn create_account(
            &self,
            _email: &EmailAddress,
            _password: &Password,
        ) -> Result<AccountCreation, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.len() > 1 {
                    replies.remove(0)
                } else {
                    replies.first().cloned().unwrap_or(IdentityReply::Created)
                }
            };
            match reply {
                IdentityReply::Created => {
                    Ok(AccountCreation::Created(Identity::new(test_user_id())))
                }
                IdentityReply::Pending => Ok(AccountCreation::PendingConfirmation),
                IdentityReply::Reject(message) => Err(ProviderError::structured(message)),
                IdentityReply::Garbage => Err(ProviderError::Payload(json!({ "weird": true }))),
            }
        }
    }

    #[derive(Clone, Default)]
    pub struct MockObjectStore {
        pub uploads: Arc<Mutex<Vec<(String, String, usize, UploadOptions)>>>,
        pub fail_with: Option<&'static str>,
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn upload(
            &self,
            bucket: &str,
            key: &StorageKey,
            bytes: Vec<u8>,
            options: &UploadOptions,
        ) -> Result<(), ProviderError> {
            if let Some(message) = self.fail_with {
                return Err(ProviderError::structured(message));
            }
            self.uploads.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                bytes.len(),
                options.clone(),
            ));
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &StorageKey) -> String {
            format!("https://cdn.example.com/{}/{}", bucket, key)
        }
    }

    #[derive(Clone, Default)]
    pub struct MockProfileRepository {
        pub inserted: Arc<Mutex<Vec<ProfileRecord>>>,
        pub fail_with: Option<&'static str>,
    }

    #[async_trait]
    impl ProfileRepository for MockProfileRepository {
        async fn insert(&self, record: &ProfileRecord) -> Result<(), ProviderError> {
            if let Some(message) = self.fail_with {
                return Err(ProviderError::structured(message));
            }
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    pub struct FixedClock(pub i64);

    impl SubmissionClock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    pub type TestUsecase = ProvisionAccountUsecase<
        MockIdentityProvider,
        MockObjectStore,
        MockProfileRepository,
        FixedClock,
    >;

    pub fn usecase(
        identity: MockIdentityProvider,
        store: MockObjectStore,
        repository: MockProfileRepository,
    ) -> TestUsecase {
        ProvisionAccountUsecase::new(
            identity,
            store,
            repository,
            FixedClock(TEST_MILLIS),
            AvatarUploadSettings::default(),
        )
    }

    #[fixture]
    pub fn input() -> RegistrationInput {
        RegistrationInput::new(
            "Somchai Jaidee",
            EmailAddress::new("somchai@example.com").unwrap(),
            Password::new("new_password").unwrap(),
            Gender::Male,
            None,
        )
        .unwrap()
    }

    #[fixture]
    pub fn input_with_avatar() -> RegistrationInput {
        RegistrationInput::new(
            "Somchai Jaidee",
            EmailAddress::new("somchai@example.com").unwrap(),
            Password::new("new_password").unwrap(),
            Gender::Male,
            Some(Avatar::new("breakfast.png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap()),
        )
        .unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_without_avatar_leaves_avatar_url_absent(input: RegistrationInput) {
        let store = MockObjectStore::default();
        let repository = MockProfileRepository::default();
        let usecase = usecase(
            MockIdentityProvider::default(),
            store.clone(),
            repository.clone(),
        );

        let outcome = usecase.submit(input).await;

        let inserted = repository.inserted.lock().unwrap().clone();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id, test_user_id());
        assert_eq!(inserted[0].avatar_url, None);
        assert_eq!(inserted[0].gender, Gender::Male);
        assert!(store.uploads.lock().unwrap().is_empty());
        assert_eq!(
            outcome,
            PipelineOutcome::Success {
                message: REGISTERED_MESSAGE.to_string(),
                profile: Some(inserted[0].clone()),
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_with_avatar_links_the_uploaded_object(input_with_avatar: RegistrationInput) {
        let store = MockObjectStore::default();
        let repository = MockProfileRepository::default();
        let usecase = usecase(
            MockIdentityProvider::default(),
            store.clone(),
            repository.clone(),
        );

        let outcome = usecase.submit(input_with_avatar).await;
        assert!(outcome.is_success());

        let expected_key = format!("{}/{}.png", TEST_ID, TEST_MILLIS);
        let uploads = store.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        let (bucket, key, size, options) = &uploads[0];
        assert_eq!(bucket, "avatars");
        assert_eq!(key, &expected_key);
        assert_eq!(*size, 4);
        assert!(options.upsert);
        assert_eq!(options.cache_control, "3600");
        assert_eq!(options.content_type, "image/png");

        let inserted = repository.inserted.lock().unwrap().clone();
        assert_eq!(
            inserted[0].avatar_url.as_deref(),
            Some(format!("https://cdn.example.com/avatars/{}", expected_key).as_str())
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_pending_confirmation_stops_after_identity(input_with_avatar: RegistrationInput) {
        let store = MockObjectStore::default();
        let repository = MockProfileRepository::default();
        let usecase = usecase(
            MockIdentityProvider::replying(vec![IdentityReply::Pending]),
            store.clone(),
            repository.clone(),
        );

        let outcome = usecase.submit(input_with_avatar).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Success {
                message: CONFIRMATION_PENDING_MESSAGE.to_string(),
                profile: None,
            }
        );
        assert!(store.uploads.lock().unwrap().is_empty());
        assert!(repository.inserted.lock().unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_identity_failure_is_fatal(input_with_avatar: RegistrationInput) {
        let store = MockObjectStore::default();
        let repository = MockProfileRepository::default();
        let usecase = usecase(
            MockIdentityProvider::replying(vec![IdentityReply::Reject(
                "User already registered",
            )]),
            store.clone(),
            repository.clone(),
        );

        let outcome = usecase.submit(input_with_avatar).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Fatal {
                category: ErrorCategory::Identity,
                message: "User already registered".to_string(),
            }
        );
        assert!(store.uploads.lock().unwrap().is_empty());
        assert!(repository.inserted.lock().unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_upload_failure_skips_insert(input_with_avatar: RegistrationInput) {
        let store = MockObjectStore {
            fail_with: Some("The object exceeded the maximum allowed size"),
            ..Default::default()
        };
        let repository = MockProfileRepository::default();
        let usecase = usecase(MockIdentityProvider::default(), store, repository.clone());

        let outcome = usecase.submit(input_with_avatar).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Fatal {
                category: ErrorCategory::AssetUpload,
                message: "The object exceeded the maximum allowed size".to_string(),
            }
        );
        assert!(repository.inserted.lock().unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_retry_after_insert_failure_hits_identity_first(input: RegistrationInput) {
        let identity = MockIdentityProvider::replying(vec![
            IdentityReply::Created,
            IdentityReply::Reject("User already registered"),
        ]);
        let repository = MockProfileRepository {
            fail_with: Some("duplicate key value violates unique constraint \"profiles_pkey\""),
            ..Default::default()
        };
        let usecase = usecase(identity.clone(), MockObjectStore::default(), repository);

        let first = usecase.submit(input.clone()).await;
        assert!(matches!(
            first,
            PipelineOutcome::Fatal {
                category: ErrorCategory::Persistence,
                ..
            }
        ));

        let second = usecase.submit(input).await;
        assert_eq!(
            second,
            PipelineOutcome::Fatal {
                category: ErrorCategory::Identity,
                message: "User already registered".to_string(),
            }
        );
        assert_eq!(identity.calls.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_non_standard_error_still_has_a_message(input: RegistrationInput) {
        let usecase = usecase(
            MockIdentityProvider::replying(vec![IdentityReply::Garbage]),
            MockObjectStore::default(),
            MockProfileRepository::default(),
        );

        let outcome = usecase.submit(input).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Fatal {
                category: ErrorCategory::Unexpected,
                message: UNEXPECTED_ERROR_MESSAGE.to_string(),
            }
        );
        assert!(!outcome.message().is_empty());
    }
}
