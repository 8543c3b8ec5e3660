//! On-disk content format
//!
//! Parsing and loading of the markdown files the blog is built from:
//! - `header`: the leading `key: value` block and body split
//! - `timestamp`: header timestamps and comment file names
//! - `loader`: reading posts, their comment directories and whole-directory scans

pub mod header;
pub mod loader;
pub mod timestamp;

pub use header::{split_document, Document, HeaderLine};
pub use loader::{load_all_posts, load_comments, load_post, ContentPaths};
