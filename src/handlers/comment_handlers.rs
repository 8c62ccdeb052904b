use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    errors::{AppError, AppResult},
    forms::CommentForm,
    handlers::redirect_to_post,
    models::{Comment, User},
    repositories::{comment_repository, post_repository},
    visibility::Viewer,
    AppState,
};

#[derive(Serialize)]
pub struct CommentFormContext {
    pub form: CommentForm,
    pub comment: Comment,
    pub is_delete: bool,
}

/// Loads a comment of a post for mutation by `user`. A missing post, a missing
/// comment, or a comment from another post is a 404; someone else's comment
/// sends the user back to the post.
async fn comment_for_author(
    state: &AppState,
    user: &User,
    post_id: Uuid,
    comment_id: Uuid,
) -> AppResult<Result<Comment, Redirect>> {
    post_repository::get_post_by_id(&state.db_pool, post_id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    let comment = comment_repository::get_comment_for_post(&state.db_pool, post_id, comment_id)
        .await?
        .ok_or(AppError::NotFound("Comment"))?;

    if comment.author_id != user.id {
        warn!(comment_id = %comment_id, user_id = %user.id, actual_author = %comment.author_id, "User attempted to modify comment they did not write");
        return Ok(Err(redirect_to_post(post_id)));
    }
    Ok(Ok(comment))
}

/// Handler to add a comment to a post the requester can see.
pub async fn add_comment_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let viewer = Viewer::User(user.id);
    post_repository::get_post_view(&state.db_pool, post_id)
        .await?
        .filter(|post| viewer.can_see(&post.visibility(), Utc::now()))
        .ok_or(AppError::NotFound("Post"))?;

    let text = form
        .validate()
        .map_err(|errors| AppError::validation(&form, errors))?;

    let comment = comment_repository::create_comment(&state.db_pool, post_id, user.id, &text).await?;
    info!(comment_id = %comment.id, post_id = %post_id, author_id = %user.id, "Successfully created comment");
    Ok(redirect_to_post(post_id).into_response())
}

pub async fn edit_comment_form_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let comment = match comment_for_author(&state, &user, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    Ok(Json(CommentFormContext {
        form: CommentForm {
            text: comment.text.clone(),
        },
        comment,
        is_delete: false,
    })
    .into_response())
}

pub async fn edit_comment_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    if let Err(redirect) = comment_for_author(&state, &user, post_id, comment_id).await? {
        return Ok(redirect.into_response());
    }

    let text = form
        .validate()
        .map_err(|errors| AppError::validation(&form, errors))?;

    comment_repository::update_comment(&state.db_pool, comment_id, &text)
        .await?
        .ok_or(AppError::NotFound("Comment"))?;
    info!(comment_id = %comment_id, post_id = %post_id, "Successfully updated comment");
    Ok(redirect_to_post(post_id).into_response())
}

pub async fn delete_comment_form_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let comment = match comment_for_author(&state, &user, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    Ok(Json(CommentFormContext {
        form: CommentForm {
            text: comment.text.clone(),
        },
        comment,
        is_delete: true,
    })
    .into_response())
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    if let Err(redirect) = comment_for_author(&state, &user, post_id, comment_id).await? {
        return Ok(redirect.into_response());
    }

    match comment_repository::delete_comment(&state.db_pool, comment_id).await? {
        1 => {
            info!(comment_id = %comment_id, post_id = %post_id, deleted_by_user = %user.id, "Successfully deleted comment");
            Ok(redirect_to_post(post_id).into_response())
        }
        _ => Err(AppError::NotFound("Comment")),
    }
}
