use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, MaybeUser},
    errors::{AppError, AppResult},
    forms::{self, PostFormData, PostSubmission, ValidPost},
    handlers::{redirect_to_post, redirect_to_profile, visible_posts_page},
    models::{Category, CommentView, Location, Post, PostView, User},
    repositories::{
        category_repository, comment_repository, location_repository,
        post_repository::{self, PostScope},
    },
    utils::{Page, PageParams},
    visibility::Viewer,
    AppState,
};

#[derive(Serialize)]
pub struct PostDetailContext {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

/// What the post form is rendered from.
#[derive(Serialize)]
pub struct PostFormContext {
    pub form: PostFormData,
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
    pub post: Option<Post>,
}

#[derive(Serialize)]
pub struct PostDeleteContext {
    pub post: PostView,
}

/// Handler for the front page: every post the viewer may see, newest first.
pub async fn index_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PostView>>> {
    let viewer = Viewer::from(user.as_ref());
    let page = visible_posts_page(&state, viewer, PostScope::All, &params).await?;
    Ok(Json(page))
}

/// Handler to show a single post with its published comments.
pub async fn post_detail_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<PostDetailContext>> {
    let viewer = Viewer::from(user.as_ref());
    let post = post_repository::get_post_view(&state.db_pool, post_id)
        .await?
        .filter(|post| viewer.can_see(&post.visibility(), Utc::now()))
        .ok_or(AppError::NotFound("Post"))?;

    let comments = comment_repository::get_published_comments(&state.db_pool, post_id).await?;
    let can_edit = viewer.owns(post.author_id);
    Ok(Json(PostDetailContext {
        post,
        comments,
        can_edit,
    }))
}

async fn form_context(
    state: &AppState,
    form: PostFormData,
    post: Option<Post>,
) -> AppResult<PostFormContext> {
    Ok(PostFormContext {
        form,
        categories: category_repository::get_all_categories(&state.db_pool).await?,
        locations: location_repository::get_all_locations(&state.db_pool).await?,
        post,
    })
}

fn form_from_post(post: &Post) -> PostFormData {
    PostFormData {
        title: post.title.clone(),
        text: post.text.clone(),
        pub_date: post.pub_date.to_rfc3339(),
        category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
        location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
        is_published: Some(post.is_published.to_string()),
    }
}

/// Field validation plus the checks that need the database: the chosen
/// category and location must exist.
async fn validate_submission(state: &AppState, submission: &PostSubmission) -> AppResult<ValidPost> {
    let (valid, mut errors) = match submission.validate() {
        Ok(valid) => (Some(valid), Default::default()),
        Err(errors) => (None, errors),
    };

    if let Some(valid) = &valid {
        if let Some(category_id) = valid.category_id {
            if category_repository::get_category_by_id(&state.db_pool, category_id)
                .await?
                .is_none()
            {
                forms::invalid_choice(&mut errors, "category");
            }
        }
        if let Some(location_id) = valid.location_id {
            if location_repository::get_location_by_id(&state.db_pool, location_id)
                .await?
                .is_none()
            {
                forms::invalid_choice(&mut errors, "location");
            }
        }
    }

    match valid {
        Some(valid) if errors.is_empty() => Ok(valid),
        _ => Err(AppError::validation(&submission.fields, errors)),
    }
}

async fn save_upload(state: &AppState, submission: PostSubmission) -> AppResult<Option<String>> {
    match submission.image {
        Some(image) => {
            let filename_for_log = image.filename.clone();
            let url = state
                .image_storage
                .save_image(image.data, image.filename.as_deref())
                .await
                .map_err(|e| {
                    error!(error = %e, image_filename = ?filename_for_log, "Failed to save post image");
                    e
                })?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

async fn remove_image(state: &AppState, image_url: &str) {
    if let Err(e) = state.image_storage.delete_image(image_url).await {
        warn!(error = %e, image_url = %image_url, "Failed to remove post image");
    }
}

/// Loads a post for mutation by `user`. Missing posts are a 404; a post owned
/// by someone else sends the user to its detail view instead.
async fn post_for_author(
    state: &AppState,
    user: &User,
    post_id: Uuid,
) -> AppResult<Result<Post, Redirect>> {
    let post = post_repository::get_post_by_id(&state.db_pool, post_id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    if post.author_id != user.id {
        warn!(post_id = %post_id, user_id = %user.id, actual_author = %post.author_id, "User attempted to modify post they did not write");
        return Ok(Err(redirect_to_post(post_id)));
    }
    Ok(Ok(post))
}

/// Handler for the empty post form.
pub async fn create_post_form_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<PostFormContext>> {
    let context = form_context(&state, PostFormData::initial(), None).await?;
    Ok(Json(context))
}

/// Handler to create a post from a multipart form. The requester becomes its author.
pub async fn create_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let submission = PostSubmission::from_multipart(multipart).await?;
    let valid = validate_submission(&state, &submission).await?;
    let image_url = save_upload(&state, submission).await?;

    let post = match post_repository::create_post(
        &state.db_pool,
        user.id,
        &valid,
        image_url.as_deref(),
    )
    .await
    {
        Ok(post) => post,
        Err(e) => {
            if let Some(url) = &image_url {
                remove_image(&state, url).await;
            }
            return Err(e.into());
        }
    };
    info!(post_id = %post.id, author_id = %user.id, "Successfully created post");
    Ok(redirect_to_post(post.id).into_response())
}

/// Handler for the edit form of an existing post.
pub async fn edit_post_form_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> AppResult<Response> {
    let post = match post_for_author(&state, &user, post_id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let context = form_context(&state, form_from_post(&post), Some(post)).await?;
    Ok(Json(context).into_response())
}

/// Handler to update a post. Without a new image the current one is kept.
pub async fn edit_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = match post_for_author(&state, &user, post_id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect.into_response()),
    };

    let submission = PostSubmission::from_multipart(multipart).await?;
    let valid = validate_submission(&state, &submission).await?;
    let new_image = save_upload(&state, submission).await?;
    let image_url = new_image.as_deref().or(post.image_url.as_deref());

    let updated = post_repository::update_post(&state.db_pool, post_id, &valid, image_url).await;
    match updated {
        Ok(Some(updated)) => {
            if let (Some(_), Some(old)) = (&new_image, &post.image_url) {
                remove_image(&state, old).await;
            }
            info!(post_id = %updated.id, "Successfully updated post");
            Ok(redirect_to_post(updated.id).into_response())
        }
        failed => {
            // The new upload is referenced by nothing.
            if let Some(url) = &new_image {
                remove_image(&state, url).await;
            }
            match failed {
                Err(e) => Err(e.into()),
                _ => {
                    warn!(post_id = %post_id, "Post disappeared during update");
                    Err(AppError::NotFound("Post"))
                }
            }
        }
    }
}

/// Handler for the delete confirmation of a post.
pub async fn delete_post_form_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> AppResult<Response> {
    if let Err(redirect) = post_for_author(&state, &user, post_id).await? {
        return Ok(redirect.into_response());
    }
    let post = post_repository::get_post_view(&state.db_pool, post_id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    Ok(Json(PostDeleteContext { post }).into_response())
}

/// Handler to delete a post together with its comments and image.
pub async fn delete_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> AppResult<Response> {
    if let Err(redirect) = post_for_author(&state, &user, post_id).await? {
        return Ok(redirect.into_response());
    }

    match post_repository::delete_post(&state.db_pool, post_id).await? {
        Some(deleted) => {
            if let Some(image_url) = &deleted.image_url {
                remove_image(&state, image_url).await;
            }
            info!(post_id = %post_id, deleted_by_user = %user.id, "Successfully deleted post");
            Ok(redirect_to_profile(&user.username).into_response())
        }
        None => {
            warn!(post_id = %post_id, "Attempted delete, but post not found during delete operation");
            Err(AppError::NotFound("Post"))
        }
    }
}
