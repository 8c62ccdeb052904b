use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::{
    auth::MaybeUser,
    errors::{AppError, AppResult},
    handlers::visible_posts_page,
    models::{Category, PostView},
    repositories::{category_repository, post_repository::PostScope},
    utils::{Page, PageParams},
    visibility::Viewer,
    AppState,
};

#[derive(Serialize)]
pub struct CategoryContext {
    pub category: Category,
    pub page: Page<PostView>,
}

/// Handler to list the posts of a published category.
pub async fn category_posts_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(category_slug): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<CategoryContext>> {
    let category = category_repository::get_published_category_by_slug(&state.db_pool, &category_slug)
        .await?
        .ok_or_else(|| {
            debug!(category_slug = %category_slug, "Category missing or unpublished");
            AppError::NotFound("Category")
        })?;

    let viewer = Viewer::from(user.as_ref());
    let page = visible_posts_page(&state, viewer, PostScope::Category(category.id), &params).await?;
    Ok(Json(CategoryContext { category, page }))
}
