pub mod category_handlers;
pub mod comment_handlers;
pub mod post_handlers;
pub mod user_handlers;

use axum::response::Redirect;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    errors::AppResult,
    models::PostView,
    repositories::post_repository::{self, PostScope},
    utils::{Page, PageParams, PageWindow},
    visibility::Viewer,
    AppState,
};

pub fn post_detail_url(post_id: Uuid) -> String {
    format!("/posts/{}", post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}", username)
}

/// Where non-authors and finished mutations are sent.
pub fn redirect_to_post(post_id: Uuid) -> Redirect {
    Redirect::to(&post_detail_url(post_id))
}

pub fn redirect_to_profile(username: &str) -> Redirect {
    Redirect::to(&profile_url(username))
}

/// One page of the posts in `scope` that `viewer` may see, with comment counts.
pub async fn visible_posts_page(
    state: &AppState,
    viewer: Viewer,
    scope: PostScope,
    params: &PageParams,
) -> AppResult<Page<PostView>> {
    let now = Utc::now();
    let total = post_repository::count_visible_posts(&state.db_pool, viewer, scope, now).await?;
    let window = PageWindow::resolve(params, state.config.posts_per_page, total.max(0) as u64);
    let posts =
        post_repository::list_visible_posts(&state.db_pool, viewer, scope, now, &window).await?;
    Ok(Page::new(posts, window))
}

pub async fn health_handler() -> &'static str {
    "OK"
}
