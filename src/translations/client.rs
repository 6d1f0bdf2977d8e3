//! Client for the translation-management service.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::Messages;
use crate::config::TranslationConfig;
use crate::errors::AppError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer-authenticated access to one translation project.
#[derive(Debug, Clone)]
pub struct TranslationApi {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_key: String,
    max_response_bytes: usize,
}

impl TranslationApi {
    /// Build a client; missing credentials are a configuration error.
    pub fn from_config(config: &TranslationConfig) -> Result<Self, AppError> {
        let missing = |key: &str| AppError::Configuration(format!("{} is not configured", key));
        let base_url = config
            .api_url
            .clone()
            .ok_or_else(|| missing("TRANSLATION_API_URL"))?;
        let project_id = config
            .project_id
            .clone()
            .ok_or_else(|| missing("TRANSLATION_PROJECT_ID"))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| missing("TRANSLATION_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            api_key,
            max_response_bytes: config.max_response_bytes,
        })
    }

    fn url(&self, locale: &str, namespace: &str) -> String {
        format!(
            "{}/v2/projects/{}/translations/{}/{}",
            self.base_url, self.project_id, locale, namespace
        )
    }

    /// Fetch one namespace. A 404 means the namespace does not exist upstream.
    pub async fn pull(&self, locale: &str, namespace: &str) -> Result<Option<Messages>, AppError> {
        let response = self
            .client
            .get(self.url(locale, namespace))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        let body = self.read_capped(response).await?;
        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(messages)) => Ok(Some(messages)),
            Ok(_) => Err(AppError::Integration(format!(
                "Translation API returned a non-object for {}/{}",
                locale, namespace
            ))),
            Err(e) => Err(AppError::Integration(format!(
                "Translation API returned invalid JSON for {}/{}: {}",
                locale, namespace, e
            ))),
        }
    }

    /// Upload one namespace, replacing the upstream copy.
    pub async fn push(
        &self,
        locale: &str,
        namespace: &str,
        messages: &Messages,
    ) -> Result<(), AppError> {
        let response = self
            .client
            .put(self.url(locale, namespace))
            .bearer_auth(&self.api_key)
            .json(messages)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = self.read_capped(response).await?;
            return Err(upstream_error(status, &body));
        }
        Ok(())
    }

    /// Read a response body, failing once it grows past the configured cap.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<Vec<u8>, AppError> {
        if let Some(length) = response.content_length() {
            if length as usize > self.max_response_bytes {
                return Err(too_large(self.max_response_bytes));
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(too_large(self.max_response_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn too_large(limit: usize) -> AppError {
    AppError::Integration(format!(
        "Translation API response exceeded {} bytes",
        limit
    ))
}

fn request_error(err: reqwest::Error) -> AppError {
    AppError::Integration(format!("Translation API request failed: {}", err))
}

fn upstream_error(status: StatusCode, body: &[u8]) -> AppError {
    let detail = String::from_utf8_lossy(&body[..body.len().min(512)]);
    AppError::Integration(format!("Translation API returned {}: {}", status, detail))
}
