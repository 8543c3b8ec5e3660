//! Post model
//!
//! This module provides:
//! - `Post` entity, one per markdown file in the post directory
//! - `ItemBody`, the raw markdown paired with its rendered HTML
//! - `PostField`, the table of header keys a post file understands
//! - Tag normalization and URL slug derivation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::content::header::Document;
use crate::content::timestamp::parse_timestamp;
use crate::models::Comment;
use crate::services::markdown::MarkdownRenderer;

/// Raw markdown kept for search, with the HTML rendered from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemBody {
    pub markdown: String,
    pub html: String,
}

impl ItemBody {
    pub fn render(markdown: String, renderer: &MarkdownRenderer) -> Self {
        let html = renderer.render(&markdown);
        Self { markdown, html }
    }
}

/// Header keys a post file understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Title,
    Id,
    Tags,
    Date,
    DisallowComments,
    Unknown,
}

impl PostField {
    pub fn from_key(key: &str) -> Self {
        match key {
            "title" => Self::Title,
            "id" => Self::Id,
            "tags" => Self::Tags,
            "date" => Self::Date,
            "disallowcomments" => Self::DisallowComments,
            _ => Self::Unknown,
        }
    }

    fn apply(self, post: &mut Post, value: &str) {
        match self {
            Self::Title => post.title = value.to_string(),
            Self::Id => post.id = value.parse().unwrap_or(0),
            Self::Tags => post.tags = parse_tags(value),
            Self::Date => post.published_at = parse_timestamp(value),
            Self::DisallowComments => post.disallow_comments = value == "true",
            Self::Unknown => {}
        }
    }
}

/// Blog post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Author-supplied identifier, 0 when missing or malformed
    pub id: i64,
    pub title: String,
    /// `YYYY/MM/DD/slug`, derived from the date and title
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Normalized, de-duplicated, in header order
    pub tags: Vec<String>,
    pub body: ItemBody,
    pub disallow_comments: bool,
    /// Backing file name inside the post directory
    pub filename: String,
    /// Ascending by date
    pub comments: Vec<Comment>,
}

impl Post {
    /// Builds a post from a parsed post file. Comments are attached by the
    /// loader afterwards.
    pub fn from_document(filename: &str, doc: Document, renderer: &MarkdownRenderer) -> Self {
        let mut post = Self {
            id: 0,
            title: String::new(),
            url: String::new(),
            published_at: DateTime::<Utc>::UNIX_EPOCH,
            tags: Vec::new(),
            body: ItemBody::default(),
            disallow_comments: false,
            filename: filename.to_string(),
            comments: Vec::new(),
        };

        for header in &doc.headers {
            PostField::from_key(&header.key).apply(&mut post, &header.value);
        }

        post.body = ItemBody::render(doc.body, renderer);
        post.url = slug_for(&post.title, &post.published_at);
        post
    }

    /// Exact membership test against a tag, normalized first.
    pub fn contains_tag(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.tags.iter().any(|t| *t == tag)
    }

    /// Case-insensitive substring search over tags, title, body and comments.
    ///
    /// Every whitespace-separated token has to match within one of: the tag
    /// list, the title and body taken together, or a single comment.
    pub fn contains_term(&self, term: &str) -> bool {
        let tokens = search_tokens(term);
        if tokens.is_empty() {
            return true;
        }
        self.matches_tokens(&tokens)
    }

    pub(crate) fn matches_tokens(&self, tokens: &[String]) -> bool {
        let in_tags = tokens
            .iter()
            .all(|token| self.tags.iter().any(|tag| tag.contains(token.as_str())));
        if in_tags {
            return true;
        }

        let title = self.title.to_lowercase();
        let body = self.body.markdown.to_lowercase();
        let in_text = tokens
            .iter()
            .all(|token| title.contains(token.as_str()) || body.contains(token.as_str()));
        if in_text {
            return true;
        }

        self.comments.iter().any(|c| c.contains_tokens(tokens))
    }

    /// Comments not flagged as spam, in stored order
    pub fn non_spam_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| !c.is_spam)
    }

    /// Whether new comments are accepted at `now`. `open_for_days == 0`
    /// keeps comments open forever.
    pub fn allows_comments(&self, open_for_days: u32, now: DateTime<Utc>) -> bool {
        if self.disallow_comments {
            return false;
        }
        if open_for_days == 0 {
            return true;
        }
        now < self.published_at + Duration::days(i64::from(open_for_days))
    }

    /// Copy of this post with `comment` appended.
    pub fn with_comment(&self, comment: Comment) -> Self {
        let mut post = self.clone();
        post.comments.push(comment);
        post
    }

    /// File stem naming this post's comment directory
    pub fn stem(&self) -> &str {
        self.filename.strip_suffix(".md").unwrap_or(&self.filename)
    }
}

/// Lowercased whitespace-separated tokens of a search term.
pub fn search_tokens(term: &str) -> Vec<String> {
    term.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalizes a tag: trimmed, lowercase, `/` and `#` removed, inner
/// whitespace runs joined with `-`.
pub fn normalize_tag(tag: &str) -> String {
    let stripped: String = tag
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '/' && *c != '#')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Splits a comma-separated `tags` header value, dropping empty entries
/// and repeats.
pub fn parse_tags(value: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.split(',').map(normalize_tag) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// URL path for a post: `YYYY/MM/DD/` followed by the title lowercased,
/// spaces turned into `-` and `, # : " ? /` removed.
pub fn slug_for(title: &str, published_at: &DateTime<Utc>) -> String {
    let slug: String = title
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| !matches!(c, ',' | '#' | ':' | '"' | '?' | '/'))
        .collect();
    format!("{}/{}", published_at.format("%Y/%m/%d"), slug)
}
