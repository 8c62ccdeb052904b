// tests/common/helpers.rs
//! Shared helper functions for integration tests
#![allow(dead_code)]

use std::{collections::HashMap, path::PathBuf};

use axum::{
    body::{Body, Bytes},
    http::{self, header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use blog_server::{
    auth::ChallengeResponse,
    config::Config,
    create_router,
    forms::ValidPost,
    models::{Category, Comment, Location, Post, User},
    repositories::{
        category_repository::{self, CreateCategoryData},
        comment_repository, location_repository, post_repository,
    },
};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use envconfig::Envconfig;
use http_body_util::BodyExt;
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestUser {
    pub keypair: SigningKey,
    pub user: User,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response ({}): {}: {}",
                self.status,
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Asserts a `303 See Other` to `expected`.
    pub fn assert_redirect(&self, expected: &str) {
        assert_eq!(
            self.status,
            StatusCode::SEE_OTHER,
            "expected redirect, body: {}",
            String::from_utf8_lossy(&self.body)
        );
        assert_eq!(self.location(), Some(expected));
    }
}

/// Where an unauthenticated request for `next` is sent.
pub fn login_location(next: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/challenge?next={}", next)
}

// Function to generate a random boundary string
pub fn generate_boundary() -> String {
    format!("----WebKitFormBoundary{}", Uuid::new_v4().simple())
}

pub fn test_config() -> Config {
    let upload_dir = std::env::temp_dir().join(format!("blog-test-uploads-{}", Uuid::new_v4()));
    let mut vars = HashMap::new();
    vars.insert(
        "BLOG_IMAGE_UPLOAD_DIR".to_string(),
        upload_dir.to_string_lossy().into_owned(),
    );
    vars.insert("BLOG_IMAGE_BASE_URL".to_string(), "/media".to_string());
    vars.insert("BLOG_POSTS_PER_PAGE".to_string(), "10".to_string());
    Config::init_from_hashmap(&vars).expect("test config")
}

pub async fn create_test_app(pool: PgPool) -> Router {
    create_test_app_with_config(pool, test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> Router {
    create_router(pool, config)
}

/// Where the image served at `image_url` lives on disk under `config`.
pub fn stored_image_path(config: &Config, image_url: &str) -> PathBuf {
    let file_name = image_url
        .strip_prefix(&config.image_base_url)
        .unwrap_or(image_url)
        .trim_start_matches('/');
    PathBuf::from(&config.image_upload_dir).join(file_name)
}

/// Number of files currently in the upload dir of `config`.
pub fn stored_image_count(config: &Config) -> usize {
    std::fs::read_dir(&config.image_upload_dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// Helper to generate a test keypair
pub fn generate_test_keypair() -> SigningKey {
    let mut csprng = OsRng {};
    SigningKey::generate(&mut csprng)
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

// Helper to get challenge and prepare auth headers
pub async fn get_auth_headers(app: &Router, keypair: &SigningKey) -> HeaderMap {
    let response = send(
        app,
        Request::builder()
            .method(http::Method::GET)
            .uri("/auth/challenge")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "Failed to get challenge");
    let challenge: ChallengeResponse = response.json();

    let nonce = BASE64_STANDARD
        .decode(&challenge.nonce_base64)
        .expect("Failed to decode nonce in helper");
    let signature = keypair.sign(&nonce);

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-blog-pubkey-base64"),
        HeaderValue::from_str(&BASE64_STANDARD.encode(keypair.verifying_key().to_bytes())).unwrap(),
    );
    headers.insert(
        HeaderName::from_static("x-blog-signature-base64"),
        HeaderValue::from_str(&BASE64_STANDARD.encode(signature.to_bytes())).unwrap(),
    );
    headers.insert(
        HeaderName::from_static("x-blog-challenge-id"),
        HeaderValue::from_str(&challenge.challenge_id.to_string()).unwrap(),
    );
    headers
}

/// Builds a request, signing it with a fresh challenge when `keypair` is given.
pub async fn request(
    app: &Router,
    method: http::Method,
    uri: &str,
    keypair: Option<&SigningKey>,
    content_type: Option<&str>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(keypair) = keypair {
        for (name, value) in get_auth_headers(app, keypair).await.iter() {
            builder = builder.header(name, value);
        }
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).unwrap()
}

pub async fn get(app: &Router, uri: &str, as_user: Option<&TestUser>) -> TestResponse {
    let req = request(
        app,
        http::Method::GET,
        uri,
        as_user.map(|u| &u.keypair),
        None,
        Body::empty(),
    )
    .await;
    send(app, req).await
}

/// POSTs an urlencoded form, as a browser would.
pub async fn post_form(
    app: &Router,
    uri: &str,
    as_user: Option<&TestUser>,
    fields: &[(&str, &str)],
) -> TestResponse {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let req = request(
        app,
        http::Method::POST,
        uri,
        as_user.map(|u| &u.keypair),
        Some("application/x-www-form-urlencoded"),
        Body::from(body),
    )
    .await;
    send(app, req).await
}

fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub struct ImagePart<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub fn multipart_body(fields: &[(&str, &str)], image: Option<ImagePart<'_>>) -> (String, Vec<u8>) {
    let boundary = generate_boundary();
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some(image) = image {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                image.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", image.content_type).as_bytes());
        body.extend_from_slice(image.data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    (boundary, body)
}

/// POSTs a multipart post form.
pub async fn post_multipart(
    app: &Router,
    uri: &str,
    as_user: Option<&TestUser>,
    fields: &[(&str, &str)],
    image: Option<ImagePart<'_>>,
) -> TestResponse {
    let (boundary, body) = multipart_body(fields, image);
    let content_type = format!("multipart/form-data; boundary={}", boundary);
    let req = request(
        app,
        http::Method::POST,
        uri,
        as_user.map(|u| &u.keypair),
        Some(content_type.as_str()),
        Body::from(body),
    )
    .await;
    send(app, req).await
}

/// Registers a fresh keypair under `username` through the API.
pub async fn register_user(app: &Router, username: &str) -> TestUser {
    let keypair = generate_test_keypair();
    let req = request(
        app,
        http::Method::POST,
        "/auth/register",
        Some(&keypair),
        Some(mime::APPLICATION_JSON.as_ref()),
        Body::from(json!({ "username": username, "first_name": "Test", "last_name": "User" }).to_string()),
    )
    .await;
    let response = send(app, req).await;
    assert_eq!(
        response.status,
        StatusCode::CREATED,
        "Failed to register user: {}",
        String::from_utf8_lossy(&response.body)
    );
    TestUser {
        keypair,
        user: response.json(),
    }
}

// --- Fixtures written straight to the database ---

pub async fn create_test_category(pool: &PgPool, slug: &str, is_published: bool) -> Category {
    category_repository::create_category(
        pool,
        CreateCategoryData {
            slug: slug.to_string(),
            title: format!("Category {}", slug),
            description: "...".to_string(),
            is_published,
        },
    )
    .await
    .expect("Failed to create category in helper")
}

pub async fn create_test_location(pool: &PgPool, name: &str, is_published: bool) -> Location {
    location_repository::create_location(pool, name, is_published)
        .await
        .expect("Failed to create location in helper")
}

pub struct PostFixture {
    pub title: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

impl PostFixture {
    /// A published post from an hour ago with no category or location.
    pub fn public(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pub_date: Utc::now() - Duration::hours(1),
            is_published: true,
            category_id: None,
            location_id: None,
        }
    }
}

pub async fn create_test_post(pool: &PgPool, author: &TestUser, fixture: PostFixture) -> Post {
    let data = ValidPost {
        title: fixture.title,
        text: "Some text".to_string(),
        pub_date: fixture.pub_date,
        category_id: fixture.category_id,
        location_id: fixture.location_id,
        is_published: fixture.is_published,
    };
    post_repository::create_post(pool, author.user.id, &data, None)
        .await
        .expect("Failed to create post in helper")
}

pub async fn create_test_comment(
    pool: &PgPool,
    post_id: Uuid,
    author: &TestUser,
    text: &str,
) -> Comment {
    comment_repository::create_comment(pool, post_id, author.user.id, text)
        .await
        .expect("Failed to create comment in helper")
}

/// Titles of the items of a paginated listing, in order.
pub fn titles(page: &serde_json::Value) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["title"].as_str().unwrap().to_string())
        .collect()
}
