//! Data models
//!
//! This module contains the in-memory entities the blog serves:
//! - Posts and their comments, parsed from markdown files
//! - The sorted post collection with its query and pagination types
//! - The tag frequency index

mod collection;
mod comment;
mod post;
mod tag;

pub use collection::{ListParams, PagedResult, PostCollection, PostPage, MAX_PER_PAGE};
pub use comment::{Comment, CommentField};
pub use post::{normalize_tag, parse_tags, search_tokens, slug_for, ItemBody, Post, PostField};
pub use tag::{TagIndex, TagWithCount};
