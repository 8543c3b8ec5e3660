//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::header::Document;
use crate::content::timestamp::{format_timestamp, parse_timestamp};
use crate::models::ItemBody;
use crate::services::markdown::MarkdownRenderer;

/// Header keys a comment file understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentField {
    Author,
    Email,
    Date,
    Spam,
    Unknown,
}

impl CommentField {
    pub fn from_key(key: &str) -> Self {
        match key {
            "author" => Self::Author,
            "email" => Self::Email,
            "date" => Self::Date,
            "spam" => Self::Spam,
            _ => Self::Unknown,
        }
    }

    fn apply(self, comment: &mut Comment, value: &str) {
        match self {
            Self::Author => comment.author = value.to_string(),
            Self::Email => comment.email = value.to_string(),
            Self::Date => comment.date = parse_timestamp(value),
            Self::Spam => comment.is_spam = value == "true",
            Self::Unknown => {}
        }
    }
}

/// A reader's response to a post, owned by that post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub body: ItemBody,
    pub is_spam: bool,
}

impl Comment {
    /// Builds a freshly submitted comment stamped with `date`.
    pub fn new(
        author: String,
        email: String,
        body: String,
        is_spam: bool,
        date: DateTime<Utc>,
        renderer: &MarkdownRenderer,
    ) -> Self {
        Self {
            author,
            email,
            date,
            body: ItemBody::render(body, renderer),
            is_spam,
        }
    }

    /// Builds a comment from a parsed comment file.
    pub fn from_document(doc: Document, renderer: &MarkdownRenderer) -> Self {
        let mut comment = Self {
            author: String::new(),
            email: String::new(),
            date: DateTime::<Utc>::UNIX_EPOCH,
            body: ItemBody::default(),
            is_spam: false,
        };

        for header in &doc.headers {
            CommentField::from_key(&header.key).apply(&mut comment, &header.value);
        }

        comment.body = ItemBody::render(doc.body, renderer);
        comment
    }

    /// True when every lowercased search token occurs in the author name or
    /// the raw body.
    pub fn contains_tokens(&self, tokens: &[String]) -> bool {
        let author = self.author.to_lowercase();
        let body = self.body.markdown.to_lowercase();
        tokens
            .iter()
            .all(|token| author.contains(token.as_str()) || body.contains(token.as_str()))
    }

    /// The on-disk representation written when a comment is saved.
    pub fn to_file_contents(&self) -> String {
        let mut content = format!(
            "Author: {}\nEmail: {}\nDate: {}\n",
            self.author,
            self.email,
            format_timestamp(&self.date)
        );

        if self.is_spam {
            content.push_str("Spam: true\n");
        }

        content.push('\n');
        content.push_str(&self.body.markdown);
        content
    }

    /// Gravatar URL derived from the commenter's email
    pub fn gravatar_url(&self) -> String {
        let email = self.email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}
