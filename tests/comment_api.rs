// tests/comment_api.rs

// Declare the common module
mod common;

use axum::http::StatusCode;
use blog_server::{models::Comment, repositories::comment_repository};
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use common::helpers::{
    create_test_app, create_test_comment, create_test_post, get, login_location, post_form,
    register_user, PostFixture,
};

async fn fetch_comment(pool: &PgPool, comment_id: Uuid) -> Option<Comment> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(pool)
        .await
        .unwrap()
}

// --- Add ---

#[sqlx::test]
async fn test_add_comment_success(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let reader = register_user(&app, "reader").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;

    let response = post_form(
        &app,
        &format!("/posts/{}/comment", post.id),
        Some(&reader),
        &[("text", "Great post!")],
    )
    .await;
    response.assert_redirect(&format!("/posts/{}", post.id));

    let detail: Value = get(&app, &format!("/posts/{}", post.id), None).await.json();
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["text"], "Great post!");
    assert_eq!(comments[0]["author_username"], "reader");
    assert_eq!(detail["post"]["comment_count"], 1);
}

#[sqlx::test]
async fn test_add_comment_requires_login(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    let uri = format!("/posts/{}/comment", post.id);

    post_form(&app, &uri, None, &[("text", "anon")])
        .await
        .assert_redirect(&login_location(&uri));
    assert_eq!(comment_repository::count_all_comments(&pool, post.id).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_add_empty_comment_is_rejected(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;

    let response = post_form(
        &app,
        &format!("/posts/{}/comment", post.id),
        Some(&author),
        &[("text", "   ")],
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let rejection: Value = response.json();
    assert!(rejection["errors"]["text"].is_array());
}

#[sqlx::test]
async fn test_add_comment_to_hidden_post_is_404(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let reader = register_user(&app, "reader").await;
    let post = create_test_post(
        &pool,
        &author,
        PostFixture {
            pub_date: Utc::now() + Duration::days(1),
            ..PostFixture::public("Scheduled")
        },
    )
    .await;
    let uri = format!("/posts/{}/comment", post.id);

    let response = post_form(&app, &uri, Some(&reader), &[("text", "early")]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // The author may already discuss their own scheduled post.
    post_form(&app, &uri, Some(&author), &[("text", "note to self")])
        .await
        .assert_redirect(&format!("/posts/{}", post.id));
}

#[sqlx::test]
async fn test_add_comment_to_missing_post_is_404(pool: PgPool) {
    let app = create_test_app(pool).await;
    let reader = register_user(&app, "reader").await;
    let response = post_form(
        &app,
        &format!("/posts/{}/comment", Uuid::new_v4()),
        Some(&reader),
        &[("text", "hello?")],
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_unpublished_comments_are_hidden_from_detail(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    create_test_comment(&pool, post.id, &author, "kept").await;
    let hidden = create_test_comment(&pool, post.id, &author, "moderated").await;
    comment_repository::set_comment_published(&pool, hidden.id, false)
        .await
        .unwrap();

    let detail: Value = get(&app, &format!("/posts/{}", post.id), None).await.json();
    let texts: Vec<&str> = detail["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["kept"]);
    assert_eq!(detail["post"]["comment_count"], 1);
    assert_eq!(comment_repository::count_all_comments(&pool, post.id).await.unwrap(), 2);
}

// --- Edit ---

#[sqlx::test]
async fn test_edit_comment_by_author(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    let comment = create_test_comment(&pool, post.id, &author, "typo").await;
    let uri = format!("/posts/{}/comment/{}/edit", post.id, comment.id);

    let form = get(&app, &uri, Some(&author)).await;
    assert_eq!(form.status, StatusCode::OK);
    let context: Value = form.json();
    assert_eq!(context["form"]["text"], "typo");
    assert_eq!(context["is_delete"], false);

    post_form(&app, &uri, Some(&author), &[("text", "fixed")])
        .await
        .assert_redirect(&format!("/posts/{}", post.id));

    let saved = fetch_comment(&pool, comment.id).await.unwrap();
    assert_eq!(saved.text, "fixed");
}

#[sqlx::test]
async fn test_edit_comment_by_non_author_redirects(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let other = register_user(&app, "other").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    let comment = create_test_comment(&pool, post.id, &author, "original").await;
    let uri = format!("/posts/{}/comment/{}/edit", post.id, comment.id);
    let detail = format!("/posts/{}", post.id);

    get(&app, &uri, Some(&other)).await.assert_redirect(&detail);
    post_form(&app, &uri, Some(&other), &[("text", "vandalised")])
        .await
        .assert_redirect(&detail);

    let saved = fetch_comment(&pool, comment.id).await.unwrap();
    assert_eq!(saved.text, "original");
}

#[sqlx::test]
async fn test_edit_comment_under_wrong_post_is_404(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("One")).await;
    let other_post = create_test_post(&pool, &author, PostFixture::public("Two")).await;
    let comment = create_test_comment(&pool, post.id, &author, "on one").await;

    let response = get(
        &app,
        &format!("/posts/{}/comment/{}/edit", other_post.id, comment.id),
        Some(&author),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = get(
        &app,
        &format!("/posts/{}/comment/{}/edit", post.id, Uuid::new_v4()),
        Some(&author),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// --- Delete ---

#[sqlx::test]
async fn test_delete_comment_by_author(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    let comment = create_test_comment(&pool, post.id, &author, "regret").await;
    let uri = format!("/posts/{}/comment/{}/delete", post.id, comment.id);

    let confirm = get(&app, &uri, Some(&author)).await;
    assert_eq!(confirm.status, StatusCode::OK);
    let context: Value = confirm.json();
    assert_eq!(context["is_delete"], true);

    post_form(&app, &uri, Some(&author), &[])
        .await
        .assert_redirect(&format!("/posts/{}", post.id));
    assert!(fetch_comment(&pool, comment.id).await.is_none());
}

#[sqlx::test]
async fn test_delete_comment_by_non_author_redirects(pool: PgPool) {
    let app = create_test_app(pool.clone()).await;
    let author = register_user(&app, "author").await;
    let other = register_user(&app, "other").await;
    let post = create_test_post(&pool, &author, PostFixture::public("Hello")).await;
    let comment = create_test_comment(&pool, post.id, &author, "mine").await;

    post_form(
        &app,
        &format!("/posts/{}/comment/{}/delete", post.id, comment.id),
        Some(&other),
        &[],
    )
    .await
    .assert_redirect(&format!("/posts/{}", post.id));
    assert!(fetch_comment(&pool, comment.id).await.is_some());
}
