//! Public site information and archive API

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::api::common::ArchiveQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::PostSummary;
use crate::models::Post;
use crate::services::BlogState;

/// Response for public site info
#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub post_count: usize,
    pub comment_count: usize,
    pub tag_count: usize,
    pub state: BlogState,
}

/// Posts of one calendar year, newest first
#[derive(Debug, Serialize)]
pub struct ArchiveYear {
    pub year: i32,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub years: Vec<ArchiveYear>,
    pub total: usize,
}

/// Build the site router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/site", get(get_site_info))
        .route("/archive", get(get_archive))
}

/// GET /api/v1/site - Site identity and repository counters
async fn get_site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    let snapshot = state.blog.snapshot();

    Json(SiteInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: state.site.name.clone(),
        description: state.site.description.clone(),
        address: state.site.address.clone(),
        post_count: snapshot.posts.len(),
        comment_count: snapshot.posts.comment_count(),
        tag_count: snapshot.tags.len(),
        state: state.blog.state(),
    })
}

/// GET /api/v1/archive - Every post grouped by year, or a single year
async fn get_archive(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let snapshot = state.blog.snapshot();

    let posts = match query.year {
        Some(year) => {
            let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
            let to = year
                .checked_add(1)
                .and_then(|next| Utc.with_ymd_and_hms(next, 1, 1, 0, 0, 0).single());
            let (Some(from), Some(to)) = (from, to) else {
                return Err(ApiError::validation_error(format!("Invalid year: {}", year)));
            };
            snapshot.posts.published_between(from, to)
        }
        None => snapshot.posts.as_slice().to_vec(),
    };

    let total = posts.len();
    Ok(Json(ArchiveResponse {
        years: group_by_year(&posts),
        total,
    }))
}

/// Groups a newest-first post list into consecutive runs of one year.
fn group_by_year(posts: &[Arc<Post>]) -> Vec<ArchiveYear> {
    let mut years: Vec<ArchiveYear> = Vec::new();

    for post in posts {
        let year = post.published_at.year();
        match years.last_mut() {
            Some(group) if group.year == year => group.posts.push(post.as_ref().into()),
            _ => years.push(ArchiveYear {
                year,
                posts: vec![post.as_ref().into()],
            }),
        }
    }

    years
}
