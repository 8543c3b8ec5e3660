//! Post collection
//!
//! This module provides:
//! - `PostCollection`, every post kept newest first
//! - `PostPage`, one page of a filtered query plus the filtered total
//! - Pagination types for list queries
//!
//! Posts are shared as `Arc<Post>` so publishing a new collection copies
//! pointers, never post bodies.

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{normalize_tag, search_tokens, Post};

/// One page of posts and the number of posts that matched overall
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<Arc<Post>>,
    pub total: usize,
}

/// Posts ordered by publish date, newest first.
///
/// Posts with equal dates keep the order they were discovered or inserted in.
#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    posts: Vec<Arc<Post>>,
}

impl PostCollection {
    pub fn new(posts: Vec<Arc<Post>>) -> Self {
        let mut collection = Self { posts };
        collection.sort();
        collection
    }

    /// Stable sort by publish date, descending.
    pub fn sort(&mut self) {
        self.posts
            .sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Post>> {
        self.posts.iter()
    }

    pub fn as_slice(&self) -> &[Arc<Post>] {
        &self.posts
    }

    /// Total number of comments across every post, spam included
    pub fn comment_count(&self) -> usize {
        self.posts.iter().map(|p| p.comments.len()).sum()
    }

    /// Posts for which `predicate` continues with `true`, in order.
    ///
    /// `ControlFlow::Break` ends the scan; its value says whether the post
    /// that triggered it is kept.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Arc<Post>>
    where
        F: FnMut(&Post) -> ControlFlow<bool, bool>,
    {
        let mut matched = Vec::new();
        for post in &self.posts {
            match predicate(post) {
                ControlFlow::Continue(keep) => {
                    if keep {
                        matched.push(Arc::clone(post));
                    }
                }
                ControlFlow::Break(keep) => {
                    if keep {
                        matched.push(Arc::clone(post));
                    }
                    break;
                }
            }
        }
        matched
    }

    /// Posts matching `term`, or every post for an empty term.
    pub fn search(&self, term: &str, start: usize, count: usize) -> PostPage {
        let tokens = search_tokens(term);
        if tokens.is_empty() {
            return paginate(self.posts.clone(), start, count);
        }
        let matched = self.filter(|post| ControlFlow::Continue(post.matches_tokens(&tokens)));
        paginate(matched, start, count)
    }

    /// Posts carrying `tag` after normalization.
    pub fn by_tag(&self, tag: &str, start: usize, count: usize) -> PostPage {
        let tag = normalize_tag(tag);
        let matched =
            self.filter(|post| ControlFlow::Continue(post.tags.iter().any(|t| *t == tag)));
        paginate(matched, start, count)
    }

    pub fn by_id(&self, id: i64) -> Option<Arc<Post>> {
        self.posts.iter().find(|p| p.id == id).cloned()
    }

    /// First post with this URL. Slugs are not guaranteed unique; the newest
    /// post wins.
    pub fn by_url(&self, url: &str) -> Option<Arc<Post>> {
        self.posts.iter().find(|p| p.url == url).cloned()
    }

    pub fn by_filename(&self, filename: &str) -> Option<Arc<Post>> {
        self.posts.iter().find(|p| p.filename == filename).cloned()
    }

    /// Posts published in `[from, to)`. Stops at the first post older than
    /// `from`.
    pub fn published_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Arc<Post>> {
        self.filter(|post| {
            if post.published_at < from {
                ControlFlow::Break(false)
            } else {
                ControlFlow::Continue(post.published_at < to)
            }
        })
    }

    /// Inserts after every post dated the same or newer, which matches
    /// appending and re-sorting.
    pub fn insert(&mut self, post: Arc<Post>) {
        let at = self
            .posts
            .partition_point(|p| p.published_at >= post.published_at);
        self.posts.insert(at, post);
    }

    /// Swaps the post backed by the same file in place and re-sorts.
    /// Returns the replaced post, or `None` when no post has that filename.
    pub fn replace(&mut self, post: Arc<Post>) -> Option<Arc<Post>> {
        let at = self.position(&post.filename)?;
        let old = std::mem::replace(&mut self.posts[at], post);
        self.sort();
        Some(old)
    }

    pub fn remove(&mut self, filename: &str) -> Option<Arc<Post>> {
        let at = self.position(filename)?;
        Some(self.posts.remove(at))
    }

    fn position(&self, filename: &str) -> Option<usize> {
        self.posts.iter().position(|p| p.filename == filename)
    }
}

/// Slices `[start, start + count)` out of `matched`. A start at or past the
/// end yields an empty page with a total of zero.
fn paginate(matched: Vec<Arc<Post>>, start: usize, count: usize) -> PostPage {
    let total = matched.len();
    if start >= total {
        return PostPage::default();
    }
    let end = start.saturating_add(count).min(total);
    PostPage {
        posts: matched[start..end].to_vec(),
        total,
    }
}

/// Largest page size a list query accepts
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Index of the first item on this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }

    pub fn limit(&self) -> usize {
        self.per_page as usize
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: usize,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: usize, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as usize) as u32
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there is a previous page
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl PagedResult<Arc<Post>> {
    pub fn from_page(page: PostPage, params: &ListParams) -> Self {
        Self::new(page.posts, page.total, params)
    }
}
