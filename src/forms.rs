//! Submission parsing and field validation for posts, comments and profiles.

use axum::{body::Bytes, extract::Multipart};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, FieldErrors};

pub const MAX_TITLE_LENGTH: usize = 256;
pub const MAX_NAME_LENGTH: usize = 150;
pub const MAX_IMAGE_SIZE_MB: usize = 10;
pub const MAX_IMAGE_SIZE_BYTES: usize = MAX_IMAGE_SIZE_MB * 1024 * 1024;

const REQUIRED: &str = "This field is required.";

fn add_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn required(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        add_error(errors, field, REQUIRED);
    }
    trimmed.to_string()
}

fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        add_error(
            errors,
            field,
            format!("Ensure this value has at most {} characters.", max),
        );
    }
}

/// Accepts what a `datetime-local` input sends (`2024-05-01T18:30`, read as UTC)
/// as well as full RFC 3339 timestamps.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Checkbox-style flag. `None` means the value is not a recognised boolean.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn optional_id(errors: &mut FieldErrors, field: &str, raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            add_error(errors, field, "Select a valid choice.");
            None
        }
    }
}

// --- Post ---

/// The text fields of a post submission, echoed back verbatim on failure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFormData {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub category: String,
    pub location: String,
    pub is_published: Option<String>,
}

#[derive(Debug)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<mime::Mime>,
    pub data: Bytes,
}

/// A post submission read from `multipart/form-data`.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub fields: PostFormData,
    pub image: Option<ImageUpload>,
}

/// A post submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub is_published: bool,
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> AppResult<String> {
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::bad_request(format!("Failed to read {} field: {}", name, e)))?;
    String::from_utf8(data.to_vec())
        .map_err(|_| AppError::bad_request(format!("Invalid UTF-8 in {} field", name)))
}

impl PostSubmission {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut submission = PostSubmission::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Multipart processing error");
                    if e.to_string().contains("body limit exceeded") {
                        return Err(AppError::PayloadTooLarge(
                            "Total upload size limit exceeded".into(),
                        ));
                    }
                    return Err(AppError::bad_request(format!(
                        "Multipart processing error: {}",
                        e
                    )));
                }
            };
            let field_name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            match field_name.as_str() {
                "title" => submission.fields.title = read_text(field, "title").await?,
                "text" => submission.fields.text = read_text(field, "text").await?,
                "pub_date" => submission.fields.pub_date = read_text(field, "pub_date").await?,
                "category" => submission.fields.category = read_text(field, "category").await?,
                "location" => submission.fields.location = read_text(field, "location").await?,
                "is_published" => {
                    submission.fields.is_published = Some(read_text(field, "is_published").await?)
                }
                "image" => {
                    let filename = field.file_name().map(|s| s.to_string());
                    let content_type = field
                        .content_type()
                        .and_then(|s| s.parse::<mime::Mime>().ok());
                    let data = field.bytes().await.map_err(|e| {
                        AppError::bad_request(format!("Failed to read image data: {}", e))
                    })?;
                    // Browsers send an empty part when no file was chosen.
                    if !data.is_empty() {
                        submission.image = Some(ImageUpload {
                            filename,
                            content_type,
                            data,
                        });
                    }
                }
                _ => { /* Ignore other fields */ }
            }
        }

        Ok(submission)
    }

    pub fn validate(&self) -> Result<ValidPost, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(image) = &self.image {
            let is_image = image
                .content_type
                .as_ref()
                .map(|m| m.type_() == mime::IMAGE)
                .unwrap_or(false);
            if !is_image {
                add_error(&mut errors, "image", "Upload a valid image.");
            }
            if image.data.len() > MAX_IMAGE_SIZE_BYTES {
                add_error(
                    &mut errors,
                    "image",
                    format!("Image size exceeds limit ({} MB).", MAX_IMAGE_SIZE_MB),
                );
            }
        }
        match self.fields.validate() {
            Ok(post) if errors.is_empty() => Ok(post),
            Ok(_) => Err(errors),
            Err(mut field_errors) => {
                field_errors.append(&mut errors);
                Err(field_errors)
            }
        }
    }
}

impl PostFormData {
    /// What an empty create form starts with: the publish box checked.
    pub fn initial() -> Self {
        Self {
            is_published: Some("true".to_string()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<ValidPost, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = required(&mut errors, "title", &self.title);
        max_length(&mut errors, "title", &title, MAX_TITLE_LENGTH);
        let text = required(&mut errors, "text", &self.text);

        let pub_date = if self.pub_date.trim().is_empty() {
            add_error(&mut errors, "pub_date", REQUIRED);
            None
        } else {
            let parsed = parse_pub_date(&self.pub_date);
            if parsed.is_none() {
                add_error(&mut errors, "pub_date", "Enter a valid date/time.");
            }
            parsed
        };

        let category_id = optional_id(&mut errors, "category", &self.category);
        let location_id = optional_id(&mut errors, "location", &self.location);

        // An unchecked checkbox is simply absent from the submission.
        let is_published = match self.is_published.as_deref() {
            None => false,
            Some(raw) => parse_flag(raw).unwrap_or_else(|| {
                add_error(&mut errors, "is_published", "Enter a valid boolean.");
                false
            }),
        };

        match pub_date {
            Some(pub_date) if errors.is_empty() => Ok(ValidPost {
                title,
                text,
                pub_date,
                category_id,
                location_id,
                is_published,
            }),
            _ => Err(errors),
        }
    }
}

// --- Comment ---

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = required(&mut errors, "text", &self.text);
        if errors.is_empty() {
            Ok(text)
        } else {
            Err(errors)
        }
    }
}

// --- Profile ---

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ValidProfile, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required(&mut errors, "username", &self.username);
        max_length(&mut errors, "username", &username, MAX_NAME_LENGTH);
        if !username.chars().all(is_username_char) {
            add_error(
                &mut errors,
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let first_name = self.first_name.trim().to_string();
        max_length(&mut errors, "first_name", &first_name, MAX_NAME_LENGTH);
        let last_name = self.last_name.trim().to_string();
        max_length(&mut errors, "last_name", &last_name, MAX_NAME_LENGTH);

        let email = self.email.trim().to_string();
        if !email.is_empty() {
            let valid = email
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
                .unwrap_or(false);
            if !valid {
                add_error(&mut errors, "email", "Enter a valid email address.");
            }
        }

        if errors.is_empty() {
            Ok(ValidProfile {
                username,
                first_name,
                last_name,
                email,
            })
        } else {
            Err(errors)
        }
    }

    pub fn username_taken() -> FieldErrors {
        let mut errors = FieldErrors::new();
        add_error(&mut errors, "username", "A user with that username already exists.");
        errors
    }
}

/// Marks a category or location reference as invalid when it does not resolve.
pub fn invalid_choice(errors: &mut FieldErrors, field: &str) {
    add_error(errors, field, "Select a valid choice.");
}
