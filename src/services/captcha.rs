//! Challenge/response verification for the comment form

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("Challenge verifier unavailable: {0}")]
    Unavailable(String),
}

/// Checks a challenge response submitted with a form
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Whether a response has to be supplied at all
    fn is_required(&self) -> bool;

    async fn verify(&self, remote_ip: &str, response: &str) -> Result<bool, CaptchaError>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// reCAPTCHA `siteverify` client. Without a secret no challenge is required.
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    secret: Option<String>,
    client: reqwest::Client,
}

impl RecaptchaVerifier {
    pub fn new(secret: Option<String>, timeout: Duration) -> Result<Self, CaptchaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptchaError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
            client,
        })
    }
}

#[async_trait]
impl ChallengeVerifier for RecaptchaVerifier {
    fn is_required(&self) -> bool {
        self.secret.is_some()
    }

    async fn verify(&self, remote_ip: &str, response: &str) -> Result<bool, CaptchaError> {
        let Some(secret) = &self.secret else {
            return Ok(true);
        };
        if response.trim().is_empty() {
            return Ok(false);
        }

        let form = [
            ("secret", secret.as_str()),
            ("response", response),
            ("remoteip", remote_ip),
        ];

        let result: SiteVerifyResponse = self
            .client
            .post(SITEVERIFY_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        if !result.success {
            tracing::debug!(errors = ?result.error_codes, "Challenge response rejected");
        }
        Ok(result.success)
    }
}
