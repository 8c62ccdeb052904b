use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod seeder;
pub mod storage;
pub mod utils;
pub mod visibility;

use auth::{get_challenge_handler, register_handler, ChallengeStore};
use config::Config;
use handlers::{
    category_handlers::category_posts_handler,
    comment_handlers::{
        add_comment_handler, delete_comment_form_handler, delete_comment_handler,
        edit_comment_form_handler, edit_comment_handler,
    },
    health_handler,
    post_handlers::{
        create_post_form_handler, create_post_handler, delete_post_form_handler,
        delete_post_handler, edit_post_form_handler, edit_post_handler, index_handler,
        post_detail_handler,
    },
    user_handlers::{edit_profile_form_handler, edit_profile_handler, profile_handler},
};
use storage::LocalImageStorage;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub image_storage: LocalImageStorage,
    pub challenge_store: ChallengeStore,
    pub config: Arc<Config>,
}

/// Builds the application router. Must be called inside a Tokio runtime
/// (the challenge store spawns its purge task).
pub fn create_router(db_pool: PgPool, config: Config) -> Router {
    let image_storage =
        LocalImageStorage::new(config.image_upload_dir.clone(), config.image_base_url.clone());
    let static_service = ServeDir::new(&image_storage.upload_dir);
    let media_path = image_storage.base_url.clone();
    let max_body_size = config.max_body_size;

    let app_state = AppState {
        db_pool,
        image_storage,
        challenge_store: ChallengeStore::new(),
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/auth/challenge", get(get_challenge_handler))
        .route("/auth/register", post(register_handler))
        .route("/category/:category_slug", get(category_posts_handler))
        .route("/profile/edit", get(edit_profile_form_handler).post(edit_profile_handler))
        .route("/profile/:username", get(profile_handler))
        .route("/posts/create", get(create_post_form_handler).post(create_post_handler))
        .route("/posts/:post_id", get(post_detail_handler))
        .route("/posts/:post_id/edit", get(edit_post_form_handler).post(edit_post_handler))
        .route("/posts/:post_id/delete", get(delete_post_form_handler).post(delete_post_handler))
        .route("/posts/:post_id/comment", post(add_comment_handler))
        .route(
            "/posts/:post_id/comment/:comment_id/edit",
            get(edit_comment_form_handler).post(edit_comment_handler),
        )
        .route(
            "/posts/:post_id/comment/:comment_id/delete",
            get(delete_comment_form_handler).post(delete_comment_handler),
        )
        .nest_service(&media_path, static_service)
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
}
