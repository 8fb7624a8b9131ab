use std::time::Duration;

use reqwest::Client;

use super::error::OllamaError;
use super::types::{GenerateRequest, GenerateResponse};

/// Anything that can produce a model reply for a prompt. The engine is
/// generic over this seam so tests can substitute scripted clients.
pub trait ModelClient {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, OllamaError>;
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

impl ModelClient for OllamaClient {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, OllamaError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OllamaError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateResponse>().await?;
        Ok(body)
    }
}
