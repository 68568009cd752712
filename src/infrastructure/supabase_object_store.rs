use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};

use crate::{
    domain::{
        error::ProviderError,
        models::asset::StorageKey,
        services::object_store::{ObjectStore, UploadOptions},
    },
    infrastructure::supabase_client::{SupabaseClient, error_from_response},
};

/// Supabase Storage buckets
#[derive(Clone)]
pub struct SupabaseObjectStore {
    client: SupabaseClient,
}

impl SupabaseObjectStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for SupabaseObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &StorageKey,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(&format!("storage/v1/object/{}/{}", bucket, key))
            .header(CACHE_CONTROL, format!("max-age={}", options.cache_control))
            .header(CONTENT_TYPE, options.content_type.as_str())
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &StorageKey) -> String {
        self.client
            .endpoint(&format!("storage/v1/object/public/{}/{}", bucket, key))
    }
}
