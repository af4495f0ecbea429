//! HTTP Creative API Implementation
//!
//! reqwest-based client for the generation service. Deliberately imposes no
//! request timeout: a generation call owns its own lifecycle and the user can
//! re-trigger manually if the service never answers.

use async_trait::async_trait;

use super::{
    ApiError, CreativeApi, ErrorBody, FeedbackRequest, GenerationRequest, GenerationResult,
    HistoryRequest, SessionHistory,
};

/// HTTP client for the generation service
#[derive(Clone)]
pub struct HttpCreativeApi {
    /// Service base URL, no trailing slash
    base_url: String,
    /// Shared HTTP client
    http_client: reqwest::Client,
}

impl HttpCreativeApi {
    /// Create a new client for the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Get the configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }

    fn feedback_url(&self) -> String {
        format!("{}/feedback", self.base_url)
    }

    fn history_url(&self) -> String {
        format!("{}/history", self.base_url)
    }

    /// Map a non-success response to `ApiError::Status`, extracting the
    /// `detail` field when the error body is parseable JSON.
    async fn status_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let detail = match response.text().await {
            Ok(body) => serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or_default(),
            Err(_) => None,
        };
        ApiError::Status { status, detail }
    }
}

#[async_trait]
impl CreativeApi for HttpCreativeApi {
    async fn generate(
        &self,
        request: &GenerationRequest,
        token: &str,
    ) -> Result<GenerationResult, ApiError> {
        let response = self
            .http_client
            .post(self.generate_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response.text().await?;
        let result: GenerationResult = serde_json::from_str(&body)?;
        tracing::debug!(
            session_id = ?result.session_id,
            output_id = ?result.output_id,
            "Generation call succeeded"
        );
        Ok(result)
    }

    async fn feedback(&self, request: &FeedbackRequest, token: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.feedback_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        // Success body is not consumed beyond the status.
        Ok(())
    }

    async fn history(
        &self,
        request: &HistoryRequest,
        token: &str,
    ) -> Result<SessionHistory, ApiError> {
        let response = self
            .http_client
            .post(self.history_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
