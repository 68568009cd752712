use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, RuntimeErr, SqlErr, sqlx,
};
use serde_json::Value;

use crate::{
    domain::{
        error::ProviderError, models::profile::ProfileRecord,
        repositories::profile_repository::ProfileRepository,
    },
    infrastructure::entity::profiles,
};

// sea-orm's `mock` feature (enabled for tests) drops `Clone` from `DatabaseConnection`
#[cfg_attr(not(test), derive(Clone))]
pub struct PostgresProfileRepository {
    db: DatabaseConnection,
}

impl PostgresProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn insert(&self, record: &ProfileRecord) -> Result<(), ProviderError> {
        let profile = profiles::ActiveModel {
            id: Set(*record.id.as_uuid()),
            full_name: Set(record.full_name.clone()),
            email: Set(record.email.clone()),
            gender: Set(record.gender.to_string()),
            avatar_url: Set(record.avatar_url.clone()),
        };

        profiles::Entity::insert(profile)
            .exec_without_returning(&self.db)
            .await
            .map_err(database_error)?;
        Ok(())
    }
}

fn database_error(err: DbErr) -> ProviderError {
    if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
        return ProviderError::Structured {
            message,
            code: Some("23505".to_string()),
        };
    }
    if let Some(message) = server_message(&err) {
        return ProviderError::structured(message);
    }
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => ProviderError::transport(err),
        // sea-orm's own wording stays in the logs
        other => ProviderError::Payload(Value::String(other.to_string())),
    }
}

/// The message Postgres itself sent back, without sea-orm's wrapping.
fn server_message(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => {
            Some(e.message().to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use super::*;
    use crate::domain::{
        error::{ErrorCategory, ProvisioningError, UNEXPECTED_ERROR_MESSAGE},
        models::{identity::UserId, registration::Gender},
    };

    fn record() -> ProfileRecord {
        ProfileRecord {
            id: UserId::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap()),
            full_name: "Malee Srisuk".to_string(),
            email: "malee@example.com".to_string(),
            gender: Gender::Female,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_insert_writes_one_profile_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repository = PostgresProfileRepository::new(db);

        repository.insert(&record()).await.unwrap();

        let log = repository.db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let statement = format!("{:?}", log[0]);
        assert!(statement.contains("INSERT INTO"));
        assert!(statement.contains("profiles"));
        assert!(statement.contains("Female"));
    }

    #[tokio::test]
    async fn test_driver_failure_is_not_shown_to_the_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Exec(RuntimeErr::Internal(
                "relation \"profiles\" does not exist".to_string(),
            ))])
            .into_connection();
        let repository = PostgresProfileRepository::new(db);

        let err = repository.insert(&record()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Payload(_)));
        assert_eq!(err.user_message(), None);
        assert!(err.to_string().contains("does not exist"));
    }

    #[rstest]
    #[case(DbErr::Custom("boom".to_string()))]
    #[case(DbErr::RecordNotInserted)]
    #[case(DbErr::Type("cannot decode gender".to_string()))]
    #[case(DbErr::Query(RuntimeErr::Internal("bad statement".to_string())))]
    fn test_sea_orm_wrappers_classify_as_unexpected(#[case] err: DbErr) {
        let classified = ProvisioningError::Persistence(database_error(err)).classify();
        assert_eq!(classified.category, ErrorCategory::Unexpected);
        assert_eq!(classified.message, UNEXPECTED_ERROR_MESSAGE);
    }

    #[test]
    fn test_connection_errors_are_transport_failures() {
        let err = database_error(DbErr::Conn(RuntimeErr::Internal("refused".to_string())));
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
