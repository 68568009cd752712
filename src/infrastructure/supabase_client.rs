use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::domain::error::ProviderError;

/// Fields Supabase services use for the human readable part of an error body, in priority order
const MESSAGE_FIELDS: [&str; 4] = ["message", "msg", "error_description", "error"];
const CODE_FIELDS: [&str; 3] = ["error_code", "code", "statusCode"];

/// Shared HTTP plumbing for the Supabase Auth and Storage adapters
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::transport)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.endpoint(path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Turns a non-2xx response into a `ProviderError`, keeping the body for diagnostics.
pub async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return ProviderError::transport(e),
    };
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    provider_error(status, body)
}

pub fn provider_error(status: u16, body: Value) -> ProviderError {
    let message = MESSAGE_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty());

    let Some(message) = message else {
        return ProviderError::Payload(body);
    };

    let code = CODE_FIELDS
        .iter()
        .find_map(|field| body.get(*field))
        .map(|code| match code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| status.to_string());

    ProviderError::Structured {
        message: message.to_string(),
        code: Some(code),
    }
}

#[cfg(test)]
pub(crate) async fn serve_fake(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
