//! Inkpost - a markdown blogging engine
//!
//! Posts and comments live as markdown files on disk. The library keeps them
//! in an in-memory repository that follows the directory through filesystem
//! notifications, and serves them over a JSON API and an RSS feed.

pub mod api;
pub mod config;
pub mod content;
pub mod models;
pub mod services;
