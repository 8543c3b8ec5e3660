//! Blog repository
//!
//! Owns the published snapshot of posts and tag counts and keeps it in step
//! with the post directory.
//!
//! Readers clone an `Arc<Snapshot>` under a brief read lock and then work on
//! it without holding anything. Writers (reconciliation and comment saves)
//! are serialized by a separate mutex; each builds the next snapshot from the
//! current one and swaps the pointer under the write lock, so a reader sees
//! either the old or the new snapshot in full.

use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::content::loader::{load_all_posts, load_post, ContentPaths};
use crate::content::timestamp::comment_filename;
use crate::models::{Comment, Post, PostCollection, PostPage, TagIndex};
use crate::services::markdown::{escape_html, MarkdownRenderer};
use crate::services::spam::{SpamCheckRequest, SpamChecker};
use crate::services::watcher::FsEvent;

/// Blog repository errors
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a post file: {0}")]
    InvalidFile(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BlogError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Repository lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BlogState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Reconciling = 3,
}

impl BlogState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Ready,
            3 => Self::Reconciling,
            _ => Self::Uninitialized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Reconciling => "reconciling",
        }
    }
}

impl std::fmt::Display for BlogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Posts and tag counts as published together
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub posts: PostCollection,
    pub tags: TagIndex,
}

impl Snapshot {
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let posts = PostCollection::new(posts.into_iter().map(Arc::new).collect());
        let tags = TagIndex::rebuild(posts.iter().map(|p| p.as_ref()));
        Self { posts, tags }
    }
}

/// A new comment as submitted, before escaping and the spam check
#[derive(Debug, Clone, Default)]
pub struct CommentSubmission {
    pub author: String,
    pub email: String,
    pub body: String,
    pub remote_ip: String,
    pub user_agent: String,
    pub referrer: String,
}

/// Restores the previous state when a reconciliation step ends.
struct StateGuard<'a> {
    state: &'a AtomicU8,
    previous: u8,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.store(self.previous, Ordering::Release);
    }
}

/// In-memory blog repository
pub struct Blog {
    paths: ContentPaths,
    renderer: MarkdownRenderer,
    spam: Arc<dyn SpamChecker>,
    address: String,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    state: AtomicU8,
}

impl Blog {
    /// Creates an empty, uninitialized repository.
    pub fn new(
        paths: ContentPaths,
        renderer: MarkdownRenderer,
        spam: Arc<dyn SpamChecker>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            paths,
            renderer,
            spam,
            address: address.into(),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
            state: AtomicU8::new(BlogState::Uninitialized as u8),
        }
    }

    /// Creates a repository and runs the initial full scan.
    pub fn open(
        paths: ContentPaths,
        renderer: MarkdownRenderer,
        spam: Arc<dyn SpamChecker>,
        address: impl Into<String>,
    ) -> Result<Self, BlogError> {
        let blog = Self::new(paths, renderer, spam, address);
        blog.load()?;
        Ok(blog)
    }

    fn load(&self) -> Result<(), BlogError> {
        let _writer = self.lock_writer();
        self.set_state(BlogState::Loading);

        match self.scan() {
            Ok(next) => {
                self.publish(next);
                self.set_state(BlogState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(BlogState::Uninitialized);
                Err(e)
            }
        }
    }

    pub fn state(&self) -> BlogState {
        BlogState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn paths(&self) -> &ContentPaths {
        &self.paths
    }

    /// The current snapshot. Holding it never blocks writers.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn search(&self, term: &str, start: usize, count: usize) -> PostPage {
        self.snapshot().posts.search(term, start, count)
    }

    pub fn by_tag(&self, tag: &str, start: usize, count: usize) -> PostPage {
        self.snapshot().posts.by_tag(tag, start, count)
    }

    pub fn by_id(&self, id: i64) -> Result<Arc<Post>, BlogError> {
        self.snapshot()
            .posts
            .by_id(id)
            .ok_or_else(|| BlogError::NotFound(format!("post with id {}", id)))
    }

    pub fn by_url(&self, url: &str) -> Result<Arc<Post>, BlogError> {
        self.snapshot()
            .posts
            .by_url(url)
            .ok_or_else(|| BlogError::NotFound(format!("post at {}", url)))
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Applies one filesystem event.
    pub fn apply(&self, event: &FsEvent) -> Result<(), BlogError> {
        match event {
            FsEvent::Created(filename) => self.add_post(filename),
            FsEvent::Modified(filename) => self.update_post(filename),
            FsEvent::Removed(filename) => self.remove_post(filename),
            FsEvent::Rescan => self.reload_all(),
        }
    }

    /// Re-reads the whole post directory and replaces the snapshot. Any
    /// failure leaves the current snapshot published.
    pub fn reload_all(&self) -> Result<(), BlogError> {
        let _writer = self.lock_writer();
        let _state = self.enter(BlogState::Reconciling);

        let next = self.scan().inspect_err(|e| {
            tracing::error!(error = %e, "Full rescan failed, keeping current posts");
        })?;
        self.publish(next);
        Ok(())
    }

    /// Parses `filename` and inserts it, replacing any post already loaded
    /// from that file.
    pub fn add_post(&self, filename: &str) -> Result<(), BlogError> {
        let _writer = self.lock_writer();
        let _state = self.enter(BlogState::Reconciling);

        let post = Arc::new(load_post(&self.paths, filename, &self.renderer)?);
        let mut next = Snapshot::clone(&self.snapshot());

        if let Some(old) = next.posts.remove(filename) {
            next.tags.remove_tags(&old.tags);
        }
        next.tags.add_tags(&post.tags);
        next.posts.insert(post);

        self.publish(next);
        tracing::debug!(filename = %filename, "Added post");
        Ok(())
    }

    /// Re-parses a post that is already loaded.
    pub fn update_post(&self, filename: &str) -> Result<(), BlogError> {
        let _writer = self.lock_writer();
        let _state = self.enter(BlogState::Reconciling);

        let current = self.snapshot();
        if current.posts.by_filename(filename).is_none() {
            return Err(BlogError::NotFound(filename.to_string()));
        }

        let post = Arc::new(load_post(&self.paths, filename, &self.renderer)?);
        let mut next = Snapshot::clone(&current);
        let new_tags = post.tags.clone();

        if let Some(old) = next.posts.replace(post) {
            next.tags.remove_tags(&old.tags);
        }
        next.tags.add_tags(&new_tags);

        self.publish(next);
        tracing::debug!(filename = %filename, "Updated post");
        Ok(())
    }

    pub fn remove_post(&self, filename: &str) -> Result<(), BlogError> {
        let _writer = self.lock_writer();
        let _state = self.enter(BlogState::Reconciling);

        let mut next = Snapshot::clone(&self.snapshot());
        let old = next
            .posts
            .remove(filename)
            .ok_or_else(|| BlogError::NotFound(filename.to_string()))?;
        next.tags.remove_tags(&old.tags);

        self.publish(next);
        tracing::debug!(filename = %filename, "Removed post");
        Ok(())
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Spam-checks, appends and persists a comment on the post stored in
    /// `filename`.
    ///
    /// The spam check runs before any lock is taken and a failing check
    /// counts as "not spam". The append and the file write run on the
    /// blocking pool, since they wait on the writer lock. A failed file
    /// write is logged and the comment stays in memory.
    pub async fn save_comment(
        self: &Arc<Self>,
        filename: &str,
        submission: CommentSubmission,
    ) -> Result<Comment, BlogError> {
        if self.snapshot().posts.by_filename(filename).is_none() {
            return Err(BlogError::NotFound(filename.to_string()));
        }

        let request = SpamCheckRequest {
            body: submission.body.clone(),
            blog_address: self.address.clone(),
            remote_ip: submission.remote_ip,
            user_agent: submission.user_agent,
            referrer: submission.referrer,
            author: submission.author.clone(),
            author_email: submission.email.clone(),
        };

        let is_spam = match self.spam.is_spam(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "Spam check failed, accepting comment");
                false
            }
        };

        let comment = Comment::new(
            escape_html(&submission.author),
            escape_html(&submission.email),
            escape_html(&submission.body),
            is_spam,
            Utc::now().trunc_subsecs(0),
            &self.renderer,
        );

        let blog = Arc::clone(self);
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || -> Result<Comment, BlogError> {
            blog.append_comment(&filename, &comment)?;
            Ok(comment)
        })
        .await?
    }

    fn append_comment(&self, filename: &str, comment: &Comment) -> Result<(), BlogError> {
        let _writer = self.lock_writer();

        let current = self.snapshot();
        let post = current
            .posts
            .by_filename(filename)
            .ok_or_else(|| BlogError::NotFound(filename.to_string()))?;

        let mut next = Snapshot::clone(&current);
        next.posts.replace(Arc::new(post.with_comment(comment.clone())));
        self.publish(next);

        // Written while still holding the writer lock so a reconcile cannot
        // re-read the post before the file exists.
        match self.persist_comment(filename, comment) {
            Ok(path) => {
                tracing::info!(path = %path.display(), spam = comment.is_spam, "Saved comment")
            }
            Err(e) => tracing::error!(
                filename = %filename,
                error = %e,
                "Failed to write comment file, comment kept in memory only"
            ),
        }
        Ok(())
    }

    /// Writes `comment` to a new file in the post's comment directory. A
    /// second comment in the same second gets a numeric suffix.
    fn persist_comment(&self, filename: &str, comment: &Comment) -> std::io::Result<PathBuf> {
        let dir = self.paths.comments_of(filename);
        std::fs::create_dir_all(&dir)?;

        let name = comment_filename(&comment.date);
        let stem = name.strip_suffix(".md").unwrap_or(&name);
        let contents = comment.to_file_contents();

        let mut candidate = dir.join(&name);
        let mut suffix = 1;
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes())?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate = dir.join(format!("{}-{}.md", stem, suffix));
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn scan(&self) -> Result<Snapshot, BlogError> {
        let started = Instant::now();
        let posts = load_all_posts(&self.paths, &self.renderer)?;

        let mut urls = HashSet::new();
        for post in &posts {
            if !urls.insert(post.url.as_str()) {
                tracing::warn!(url = %post.url, filename = %post.filename, "Duplicate post URL");
            }
        }

        let snapshot = Snapshot::from_posts(posts);
        tracing::info!(
            count = snapshot.posts.len(),
            tags = snapshot.tags.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded posts"
        );
        Ok(snapshot)
    }

    fn publish(&self, next: Snapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(next);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: BlogState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn enter(&self, state: BlogState) -> StateGuard<'_> {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        StateGuard {
            state: &self.state,
            previous,
        }
    }
}
