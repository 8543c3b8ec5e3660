//! RSS feed
//!
//! Renders the newest posts as RSS 2.0 through a built-in Tera template. The
//! template name ends in `.xml`, so Tera escapes every interpolated value.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::error::Error as _;
use tera::{Context as TeraContext, Tera};
use thiserror::Error;

use crate::api::middleware::{ApiError, AppState};
use crate::config::BlogConfig;
use crate::models::Post;

/// Number of posts carried by the feed
pub const FEED_SIZE: usize = 10;

const FEED_TEMPLATE_NAME: &str = "rss.xml";

const FEED_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{{ name }}</title>
    <link>{{ address }}</link>
    <description>{{ description }}</description>
    {%- if updated %}
    <lastBuildDate>{{ updated }}</lastBuildDate>
    {%- endif %}
    {%- for item in items %}
    <item>
      <title>{{ item.title }}</title>
      <link>{{ item.link }}</link>
      <guid>{{ item.link }}</guid>
      <pubDate>{{ item.pub_date }}</pubDate>
      {%- for tag in item.tags %}
      <category>{{ tag }}</category>
      {%- endfor %}
      <description>{{ item.description }}</description>
    </item>
    {%- endfor %}
  </channel>
</rss>
"#;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed template error: {0}")]
    Template(String),
}

impl From<tera::Error> for FeedError {
    fn from(e: tera::Error) -> Self {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(s) = source {
            message.push_str(&format!("\n  Caused by: {}", s));
            source = s.source();
        }
        Self::Template(message)
    }
}

#[derive(Debug, Serialize)]
struct FeedItem {
    title: String,
    link: String,
    pub_date: String,
    tags: Vec<String>,
    description: String,
}

/// Tera instance holding the feed template
pub struct FeedRenderer {
    tera: Tera,
}

impl FeedRenderer {
    pub fn new() -> Result<Self, FeedError> {
        let mut tera = Tera::default();
        tera.add_raw_template(FEED_TEMPLATE_NAME, FEED_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Renders `posts` (newest first) as an RSS document for `site`.
    pub fn render<'a, I>(&self, site: &BlogConfig, posts: I) -> Result<String, FeedError>
    where
        I: IntoIterator<Item = &'a Post>,
    {
        let base = site.address.trim_end_matches('/');
        let items: Vec<FeedItem> = posts
            .into_iter()
            .take(FEED_SIZE)
            .map(|post| FeedItem {
                title: post.title.clone(),
                link: format!("{}/{}", base, post.url),
                pub_date: post.published_at.to_rfc2822(),
                tags: post.tags.clone(),
                description: post.body.html.clone(),
            })
            .collect();

        let mut context = TeraContext::new();
        context.insert("name", &site.name);
        context.insert("description", &site.description);
        context.insert("address", &site.address);
        context.insert("updated", &items.first().map(|item| item.pub_date.clone()));
        context.insert("items", &items);

        Ok(self.tera.render(FEED_TEMPLATE_NAME, &context)?)
    }
}

/// Build the feed router (mounted at the site root)
pub fn router() -> Router<AppState> {
    Router::new().route("/rss", get(get_feed))
}

/// GET /rss
async fn get_feed(State(state): State<AppState>) -> Result<Response, ApiError> {
    let snapshot = state.blog.snapshot();
    let xml = state
        .feed
        .render(&state.site, snapshot.posts.iter().map(|p| p.as_ref()))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to render feed");
            ApiError::internal_error(e.to_string())
        })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}
