//! Shared API response types
//!
//! Posts are served in two shapes: a summary for list views and a detail view
//! that carries the rendered body and the non-spam comments.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{Comment, PagedResult, Post, TagWithCount};

// ============================================================================
// Post Response Types
// ============================================================================

/// Post as shown in list views
#[derive(Debug, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub tags: Vec<String>,
    pub comment_count: usize,
}

/// Full post with its body and visible comments
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub tags: Vec<String>,
    pub content: String,
    pub content_html: String,
    pub allows_comments: bool,
    pub comments: Vec<CommentResponse>,
}

/// Comment as exposed to readers; the email address stays private
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub author: String,
    pub avatar_url: String,
    pub date: String,
    pub content_html: String,
}

/// Tag with its post count
#[derive(Debug, Serialize, Deserialize)]
pub struct TagResponse {
    pub name: String,
    pub post_count: usize,
}

/// Tag cloud response
#[derive(Debug, Serialize, Deserialize)]
pub struct TagListResponse {
    pub tags: Vec<TagResponse>,
}

// ============================================================================
// Pagination Response Types
// ============================================================================

/// Paginated post list response
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedPostsResponse {
    pub posts: Vec<PostSummary>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            url: post.url.clone(),
            published_at: post.published_at.to_rfc3339(),
            tags: post.tags.clone(),
            comment_count: post.non_spam_comments().count(),
        }
    }
}

impl PostDetail {
    /// Builds the detail view; `allows_comments` is decided by the caller's policy.
    pub fn new(post: &Post, allows_comments: bool) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            url: post.url.clone(),
            published_at: post.published_at.to_rfc3339(),
            tags: post.tags.clone(),
            content: post.body.markdown.clone(),
            content_html: post.body.html.clone(),
            allows_comments,
            comments: post.non_spam_comments().map(CommentResponse::from).collect(),
        }
    }
}

impl From<&Comment> for CommentResponse {
    fn from(comment: &Comment) -> Self {
        Self {
            author: comment.author.clone(),
            avatar_url: comment.gravatar_url(),
            date: comment.date.to_rfc3339(),
            content_html: comment.body.html.clone(),
        }
    }
}

impl From<TagWithCount> for TagResponse {
    fn from(tag: TagWithCount) -> Self {
        Self {
            name: tag.name,
            post_count: tag.post_count,
        }
    }
}

impl From<PagedResult<Arc<Post>>> for PaginatedPostsResponse {
    fn from(result: PagedResult<Arc<Post>>) -> Self {
        let total_pages = result.total_pages();
        let has_next = result.has_next();
        let has_prev = result.has_prev();
        let result = result.map(|post| PostSummary::from(post.as_ref()));

        Self {
            posts: result.items,
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            total_pages,
            has_next,
            has_prev,
        }
    }
}
