//! Spam checking
//!
//! Comment submissions are checked against an external reputation service
//! before they are stored. The blog treats every failure here as "not spam".

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Spam check errors
#[derive(Debug, Error)]
pub enum SpamError {
    #[error("Spam service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected spam service response: {0}")]
    InvalidResponse(String),
}

/// Everything the spam service is told about a submission
#[derive(Debug, Clone, Default)]
pub struct SpamCheckRequest {
    pub body: String,
    pub blog_address: String,
    pub remote_ip: String,
    pub user_agent: String,
    pub referrer: String,
    pub author: String,
    pub author_email: String,
}

/// Spam verdict provider
#[async_trait]
pub trait SpamChecker: Send + Sync {
    /// Returns `true` when the submission is spam.
    async fn is_spam(&self, request: &SpamCheckRequest) -> Result<bool, SpamError>;
}

/// Akismet `comment-check` client
///
/// Without an API key every submission is reported as not spam and no
/// request is made.
#[derive(Debug, Clone)]
pub struct AkismetChecker {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AkismetChecker {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, SpamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SpamError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    fn endpoint(api_key: &str) -> String {
        format!("https://{}.rest.akismet.com/1.1/comment-check", api_key)
    }
}

#[async_trait]
impl SpamChecker for AkismetChecker {
    async fn is_spam(&self, request: &SpamCheckRequest) -> Result<bool, SpamError> {
        let Some(api_key) = &self.api_key else {
            return Ok(false);
        };

        let form = [
            ("blog", request.blog_address.as_str()),
            ("user_ip", request.remote_ip.as_str()),
            ("user_agent", request.user_agent.as_str()),
            ("referrer", request.referrer.as_str()),
            ("comment_type", "comment"),
            ("comment_content", request.body.as_str()),
            ("comment_author", request.author.as_str()),
            ("comment_author_email", request.author_email.as_str()),
        ];

        let response = self
            .client
            .post(Self::endpoint(api_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| SpamError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpamError::Unavailable(e.to_string()))?;

        parse_verdict(status, &body)
    }
}

/// Reads a comment-check reply: a 2xx status with a body of exactly `true`
/// or `false`.
fn parse_verdict(status: reqwest::StatusCode, body: &str) -> Result<bool, SpamError> {
    if !status.is_success() {
        return Err(SpamError::InvalidResponse(format!("HTTP {}", status.as_u16())));
    }

    match body.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SpamError::InvalidResponse(other.chars().take(200).collect())),
    }
}
