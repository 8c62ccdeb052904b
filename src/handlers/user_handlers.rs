use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    auth::{CurrentUser, MaybeUser},
    errors::{AppError, AppResult},
    forms::ProfileForm,
    handlers::{redirect_to_profile, visible_posts_page},
    models::{PostView, User},
    repositories::{
        post_repository::PostScope,
        user_repository::{self, UserConflict},
    },
    utils::{Page, PageParams},
    visibility::Viewer,
    AppState,
};

#[derive(Serialize)]
pub struct ProfileContext {
    pub profile: User,
    pub is_owner: bool,
    pub page: Page<PostView>,
}

#[derive(Serialize)]
pub struct ProfileFormContext {
    pub form: ProfileForm,
}

/// Handler for a user's page. The owner sees all of their posts, everyone
/// else only the publicly visible ones.
pub async fn profile_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<ProfileContext>> {
    let profile = user_repository::get_user_by_username(&state.db_pool, &username)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let viewer = Viewer::from(user.as_ref());
    let page = visible_posts_page(&state, viewer, PostScope::Author(profile.id), &params).await?;
    Ok(Json(ProfileContext {
        is_owner: viewer.owns(profile.id),
        profile,
        page,
    }))
}

/// Handler for the profile form, prefilled with the current values.
pub async fn edit_profile_form_handler(CurrentUser(user): CurrentUser) -> Json<ProfileFormContext> {
    Json(ProfileFormContext {
        form: ProfileForm {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        },
    })
}

/// Handler to update the requester's own profile.
pub async fn edit_profile_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let profile = form
        .validate()
        .map_err(|errors| AppError::validation(&form, errors))?;

    if user_repository::is_username_taken(&state.db_pool, &profile.username, Some(user.id)).await? {
        return Err(AppError::validation(&form, ProfileForm::username_taken()));
    }

    let updated = user_repository::update_profile(&state.db_pool, user.id, &profile)
        .await
        .map_err(|e| match user_repository::unique_conflict(&e) {
            Some(UserConflict::Username) => {
                AppError::validation(&form, ProfileForm::username_taken())
            }
            _ => e.into(),
        })?;
    match updated {
        Some(updated) => {
            info!(user_id = %updated.id, username = %updated.username, "Successfully updated profile");
            Ok(redirect_to_profile(&updated.username).into_response())
        }
        None => {
            warn!(user_id = %user.id, "User disappeared during profile update");
            Err(AppError::NotFound("User"))
        }
    }
}
