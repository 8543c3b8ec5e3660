//! Post API endpoints
//!
//! Read-only access to the post repository plus comment submission.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::api::common::{ClientMeta, SearchQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{CommentResponse, PaginatedPostsResponse, PostDetail};
use crate::models::{ListParams, PagedResult};
use crate::services::CommentForm;

/// URL segments of a post: `{year}/{month}/{day}/{title}`
type UrlSegments = (String, String, String, String);

fn join_url((year, month, day, title): UrlSegments) -> String {
    format!("{}/{}/{}/{}", year, month, day, title)
}

/// Build the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/id/{id}", get(get_post_by_id))
        .route("/{year}/{month}/{day}/{title}", get(get_post_by_url))
        .route("/{year}/{month}/{day}/{title}/comments", post(create_comment))
}

/// GET /api/v1/posts - Newest-first listing, filtered by `search` when given
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<PaginatedPostsResponse> {
    let params = ListParams::new(query.page, state.site.posts_per_page);
    let page = state
        .blog
        .search(&query.search, params.offset(), params.limit());

    Json(PagedResult::from_page(page, &params).into())
}

/// GET /api/v1/posts/id/{id}
async fn get_post_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = state.blog.by_id(id)?;
    let open = post.allows_comments(state.site.comments_open_for_days, Utc::now());
    Ok(Json(PostDetail::new(&post, open)))
}

/// GET /api/v1/posts/{year}/{month}/{day}/{title}
async fn get_post_by_url(
    State(state): State<AppState>,
    Path(segments): Path<UrlSegments>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = state.blog.by_url(&join_url(segments))?;
    let open = post.allows_comments(state.site.comments_open_for_days, Utc::now());
    Ok(Json(PostDetail::new(&post, open)))
}

/// POST /api/v1/posts/{year}/{month}/{day}/{title}/comments
///
/// Spam is accepted with 201 like any other comment; it is stored flagged and
/// never shown.
async fn create_comment(
    State(state): State<AppState>,
    Path(segments): Path<UrlSegments>,
    ClientMeta(meta): ClientMeta,
    Json(form): Json<CommentForm>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let url = join_url(segments);
    let comment = state.comment_service.submit(&url, form, meta).await?;

    tracing::info!(url = %url, spam = comment.is_spam, "Comment received");

    Ok((StatusCode::CREATED, Json(CommentResponse::from(&comment))))
}
