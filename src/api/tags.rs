//! Tag API endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{AppState, ApiError};
use crate::api::responses::{PaginatedPostsResponse, TagListResponse, TagResponse};
use crate::models::{normalize_tag, ListParams, PagedResult, PostPage};
use crate::services::Snapshot;

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{tag}", get(get_tag_posts))
}

/// GET /api/v1/tags - Tag cloud, most used first
async fn list_tags(State(state): State<AppState>) -> Json<TagListResponse> {
    let tags = state
        .blog
        .snapshot()
        .tags
        .cloud()
        .into_iter()
        .map(TagResponse::from)
        .collect();

    Json(TagListResponse { tags })
}

/// GET /api/v1/tags/{tag} - Posts carrying the tag
async fn get_tag_posts(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedPostsResponse>, ApiError> {
    let params = ListParams::new(query.page, state.site.posts_per_page);
    let page = tag_page(&state.blog.snapshot(), &tag, &params)?;

    Ok(Json(PagedResult::from_page(page, &params).into()))
}

/// One page of `tag`, answered from a single snapshot so the existence
/// check and the listing agree.
fn tag_page(snapshot: &Snapshot, tag: &str, params: &ListParams) -> Result<PostPage, ApiError> {
    let tag = normalize_tag(tag);
    if snapshot.tags.count(&tag) == 0 {
        return Err(ApiError::not_found(format!("Tag not found: {}", tag)));
    }

    Ok(snapshot.posts.by_tag(&tag, params.offset(), params.limit()))
}
