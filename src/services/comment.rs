//! Comment service
//!
//! The form layer in front of `Blog::save_comment`: checks that the post is
//! open for comments, validates the submitted fields and verifies the
//! challenge response when one is configured.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Comment;
use crate::services::blog::{Blog, BlogError, CommentSubmission};
use crate::services::captcha::ChallengeVerifier;

const MAX_AUTHOR_LEN: usize = 254;
const MIN_EMAIL_LEN: usize = 5;
const MAX_EMAIL_LEN: usize = 254;
const MAX_BODY_LEN: usize = 5000;

/// Error types for comment submission
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation error: {}", describe(.0))]
    Validation(Vec<FieldError>),

    #[error("Comments are closed for this post")]
    CommentsClosed,

    #[error("Challenge response was not accepted")]
    ChallengeFailed,

    #[error(transparent)]
    Blog(#[from] BlogError),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One rejected form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Comment form as posted by a reader
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub body: String,
    /// Challenge response token, when the form carries one
    #[serde(default)]
    pub challenge_response: Option<String>,
}

/// Request details passed on to the spam check
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub remote_ip: String,
    pub user_agent: String,
    pub referrer: String,
}

/// Trims every field and checks lengths, collecting every failure.
pub fn validate_form(form: &CommentForm) -> Result<CommentForm, Vec<FieldError>> {
    let author = form.author.trim();
    let email = form.email.trim();
    let body = form.body.trim();
    let mut errors = Vec::new();

    if author.is_empty() {
        errors.push(FieldError { field: "author", message: "is required" });
    } else if author.len() > MAX_AUTHOR_LEN {
        errors.push(FieldError { field: "author", message: "is too long" });
    }

    if email.len() < MIN_EMAIL_LEN || !email.contains('@') {
        errors.push(FieldError { field: "email", message: "is not a valid address" });
    } else if email.len() > MAX_EMAIL_LEN {
        errors.push(FieldError { field: "email", message: "is too long" });
    }

    if body.is_empty() {
        errors.push(FieldError { field: "body", message: "is required" });
    } else if body.len() > MAX_BODY_LEN {
        errors.push(FieldError { field: "body", message: "is too long" });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CommentForm {
        author: author.to_string(),
        email: email.to_string(),
        body: body.to_string(),
        challenge_response: form.challenge_response.clone(),
    })
}

/// Comment service
pub struct CommentService {
    blog: Arc<Blog>,
    verifier: Arc<dyn ChallengeVerifier>,
    open_for_days: u32,
}

impl CommentService {
    pub fn new(blog: Arc<Blog>, verifier: Arc<dyn ChallengeVerifier>, open_for_days: u32) -> Self {
        Self {
            blog,
            verifier,
            open_for_days,
        }
    }

    /// Submits a comment on the post at `url`.
    ///
    /// # Errors
    /// - `Blog(NotFound)` if no post has that URL
    /// - `CommentsClosed` if the post no longer takes comments
    /// - `Validation` with every rejected field
    /// - `ChallengeFailed` if the challenge is rejected or cannot be checked
    pub async fn submit(
        &self,
        url: &str,
        form: CommentForm,
        meta: RequestMeta,
    ) -> Result<Comment, CommentServiceError> {
        let post = self.blog.by_url(url)?;

        if !post.allows_comments(self.open_for_days, Utc::now()) {
            return Err(CommentServiceError::CommentsClosed);
        }

        let form = validate_form(&form).map_err(CommentServiceError::Validation)?;

        if self.verifier.is_required() {
            let response = form.challenge_response.as_deref().unwrap_or_default();
            match self.verifier.verify(&meta.remote_ip, response).await {
                Ok(true) => {}
                Ok(false) => return Err(CommentServiceError::ChallengeFailed),
                Err(e) => {
                    tracing::warn!(error = %e, "Challenge verification failed, rejecting comment");
                    return Err(CommentServiceError::ChallengeFailed);
                }
            }
        }

        let submission = CommentSubmission {
            author: form.author,
            email: form.email,
            body: form.body,
            remote_ip: meta.remote_ip,
            user_agent: meta.user_agent,
            referrer: meta.referrer,
        };

        Ok(self.blog.save_comment(&post.filename, submission).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::loader::ContentPaths;
    use crate::services::captcha::{CaptchaError, RecaptchaVerifier};
    use crate::services::markdown::MarkdownRenderer;
    use crate::services::spam::AkismetChecker;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    enum Challenge {
        Accept,
        Reject,
        Down,
    }

    #[async_trait]
    impl ChallengeVerifier for Challenge {
        fn is_required(&self) -> bool {
            true
        }

        async fn verify(&self, _remote_ip: &str, _response: &str) -> Result<bool, CaptchaError> {
            match self {
                Self::Accept => Ok(true),
                Self::Reject => Ok(false),
                Self::Down => Err(CaptchaError::Unavailable("timeout".into())),
            }
        }
    }

    fn form(author: &str, email: &str, body: &str) -> CommentForm {
        CommentForm {
            author: author.into(),
            email: email.into(),
            body: body.into(),
            challenge_response: Some("token".into()),
        }
    }

    fn blog(dir: &TempDir) -> Arc<Blog> {
        let paths = ContentPaths::new(dir.path().join("posts"), dir.path().join("comments"));
        std::fs::create_dir_all(&paths.post_dir).unwrap();
        std::fs::write(
            paths.post_file("open.md"),
            "Title: Open\nDate: 2020-01-01 00:00:00\n\nx",
        )
        .unwrap();
        std::fs::write(
            paths.post_file("closed.md"),
            "Title: Closed\nDate: 2020-01-02 00:00:00\nDisallowComments: true\n\nx",
        )
        .unwrap();
        let spam = AkismetChecker::new(None, Duration::from_secs(1)).unwrap();
        Arc::new(Blog::open(paths, MarkdownRenderer::new(), Arc::new(spam), "").unwrap())
    }

    fn no_challenge() -> Arc<dyn ChallengeVerifier> {
        Arc::new(RecaptchaVerifier::new(None, Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn test_validate_trims_fields() {
        let valid = validate_form(&form("  Ann ", " ann@example.com ", " hi ")).unwrap();
        assert_eq!(valid.author, "Ann");
        assert_eq!(valid.email, "ann@example.com");
        assert_eq!(valid.body, "hi");
    }

    #[test]
    fn test_validate_collects_every_error() {
        let errors = validate_form(&form(" ", "nope", "")).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["author", "email", "body"]);
    }

    #[test]
    fn test_validate_length_limits() {
        let long_author = "a".repeat(MAX_AUTHOR_LEN + 1);
        let long_body = "b".repeat(MAX_BODY_LEN + 1);
        let errors = validate_form(&form(&long_author, "a@b.c", &long_body)).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.message == "is too long"));

        assert!(validate_form(&form("a", "a@b", "x")).is_err());
        assert!(validate_form(&form("a", "a@b.c", "x")).is_ok());
    }

    #[tokio::test]
    async fn test_submit_saves_comment() {
        let dir = TempDir::new().unwrap();
        let blog = blog(&dir);
        let service = CommentService::new(Arc::clone(&blog), no_challenge(), 0);

        let comment = service
            .submit("2020/01/01/open", form("Ann", "ann@example.com", "Hello"), RequestMeta::default())
            .await
            .unwrap();

        assert_eq!(comment.author, "Ann");
        assert_eq!(blog.by_url("2020/01/01/open").unwrap().comments.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_closed_post() {
        let dir = TempDir::new().unwrap();
        let service = CommentService::new(blog(&dir), no_challenge(), 0);

        let err = service
            .submit("2020/01/02/closed", form("Ann", "ann@example.com", "Hello"), RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::CommentsClosed));
    }

    #[tokio::test]
    async fn test_submit_rejects_after_window() {
        let dir = TempDir::new().unwrap();
        let service = CommentService::new(blog(&dir), no_challenge(), 30);

        let err = service
            .submit("2020/01/01/open", form("Ann", "ann@example.com", "Hello"), RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::CommentsClosed));
    }

    #[tokio::test]
    async fn test_submit_unknown_post() {
        let dir = TempDir::new().unwrap();
        let service = CommentService::new(blog(&dir), no_challenge(), 0);

        let err = service
            .submit("2020/01/01/ghost", form("Ann", "ann@example.com", "Hello"), RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::Blog(BlogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_challenge_outcomes() {
        let dir = TempDir::new().unwrap();
        let blog = blog(&dir);
        let submit = |verifier: Challenge| {
            let service = CommentService::new(Arc::clone(&blog), Arc::new(verifier), 0);
            async move {
                service
                    .submit("2020/01/01/open", form("Ann", "ann@example.com", "Hi"), RequestMeta::default())
                    .await
            }
        };

        assert!(submit(Challenge::Accept).await.is_ok());
        assert!(matches!(
            submit(Challenge::Reject).await,
            Err(CommentServiceError::ChallengeFailed)
        ));
        assert!(matches!(
            submit(Challenge::Down).await,
            Err(CommentServiceError::ChallengeFailed)
        ));
    }
}
