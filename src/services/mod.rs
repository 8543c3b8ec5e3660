//! Services layer
//!
//! This module contains the blog repository and the collaborators around it:
//! - `blog`: the in-memory post repository and comment saving
//! - `watcher`: filesystem notifications and the reconciler task
//! - `comment`: comment form validation in front of the repository
//! - `markdown`, `spam`, `captcha`: rendering and external verification

pub mod blog;
pub mod captcha;
pub mod comment;
pub mod markdown;
pub mod spam;
pub mod watcher;

pub use blog::{Blog, BlogError, BlogState, CommentSubmission, Snapshot};
pub use captcha::{CaptchaError, ChallengeVerifier, RecaptchaVerifier};
pub use comment::{CommentForm, CommentService, CommentServiceError, FieldError, RequestMeta};
pub use markdown::MarkdownRenderer;
pub use spam::{AkismetChecker, SpamCheckRequest, SpamChecker, SpamError};
pub use watcher::{spawn_reconciler, FsEvent, PostWatcher, ReconcilerHandle};
