use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use dashmap::DashMap;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{thread_rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    forms::ProfileForm,
    models::User,
    repositories::user_repository::{self, UserConflict},
    AppState,
};

// --- Challenge Nonce Storage ---

const CHALLENGE_TTL: Duration = Duration::from_secs(60 * 5);
const NONCE_LENGTH: usize = 32;

#[derive(Debug, Clone)]
struct ChallengeNonce {
    nonce: Vec<u8>,
    expires_at: Instant,
}

/// Single-use login challenges, keyed by challenge id.
#[derive(Debug, Clone)]
pub struct ChallengeStore {
    challenges: Arc<DashMap<Uuid, ChallengeNonce>>,
}

impl ChallengeStore {
    /// Creates the store and spawns its purge task; needs a Tokio runtime.
    pub fn new() -> Self {
        let store = Self {
            challenges: Arc::new(DashMap::new()),
        };
        let store_clone = store.clone();
        tokio::spawn(async move {
            store_clone.purge_expired_periodically().await;
        });
        store
    }

    /// Generates a new challenge, stores it, and returns the ID and nonce.
    pub fn generate(&self) -> (Uuid, Vec<u8>) {
        let challenge_id = Uuid::new_v4();
        let mut nonce = vec![0u8; NONCE_LENGTH];
        thread_rng().fill_bytes(&mut nonce);

        self.challenges.insert(
            challenge_id,
            ChallengeNonce {
                nonce: nonce.clone(),
                expires_at: Instant::now() + CHALLENGE_TTL,
            },
        );

        (challenge_id, nonce)
    }

    /// Consumes a challenge. Returns its nonce if it existed and had not expired.
    pub fn use_challenge(&self, challenge_id: Uuid) -> Option<Vec<u8>> {
        self.challenges
            .remove(&challenge_id)
            .filter(|(_, challenge)| challenge.expires_at > Instant::now())
            .map(|(_, challenge)| challenge.nonce)
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    fn purge_expired(&self) {
        self.challenges
            .retain(|_, challenge| challenge.expires_at > Instant::now());
    }

    async fn purge_expired_periodically(&self) {
        let mut interval = tokio::time::interval(CHALLENGE_TTL);
        loop {
            interval.tick().await;
            self.purge_expired();
        }
    }
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

// --- Auth Endpoints ---

#[derive(Debug, Deserialize)]
pub struct ChallengeParams {
    pub next: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChallengeResponse {
    pub challenge_id: Uuid,
    pub nonce_base64: String,
    /// Where the client was headed when it was sent to log in.
    pub next: Option<String>,
}

/// Handler to generate and return a new authentication challenge.
/// Doubles as the login page unauthenticated mutations are redirected to.
pub async fn get_challenge_handler(
    State(state): State<AppState>,
    Query(params): Query<ChallengeParams>,
) -> Json<ChallengeResponse> {
    let (id, nonce) = state.challenge_store.generate();
    Json(ChallengeResponse {
        challenge_id: id,
        nonce_base64: BASE64_STANDARD.encode(&nonce),
        next: params.next,
    })
}

/// Registers the authenticated key as a new user.
pub async fn register_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ProfileForm>,
) -> AppResult<Response> {
    let profile = payload
        .validate()
        .map_err(|errors| AppError::validation(&payload, errors))?;

    if user_repository::get_user_by_public_key(&state.db_pool, &user.0)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("This key is already registered".into()));
    }
    if user_repository::is_username_taken(&state.db_pool, &profile.username, None).await? {
        return Err(AppError::validation(&payload, ProfileForm::username_taken()));
    }

    let created = match user_repository::create_user(&state.db_pool, &user.0, &profile).await {
        Ok(created) => created,
        Err(e) => {
            return Err(match user_repository::unique_conflict(&e) {
                Some(UserConflict::Username) => {
                    AppError::validation(&payload, ProfileForm::username_taken())
                }
                Some(UserConflict::PublicKey) => {
                    AppError::Conflict("This key is already registered".into())
                }
                None => e.into(),
            })
        }
    };
    info!(user_id = %created.id, username = %created.username, "Registered new user");
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

// --- Error Types ---

#[derive(Debug, Error, Clone)]
pub enum AuthError {
    #[error("Missing or invalid authentication header(s)")]
    MissingOrInvalidHeaders,

    #[error("Invalid Base64 encoding")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid public key format")]
    InvalidPublicKey,

    #[error("Invalid signature format")]
    InvalidSignature,

    #[error("Invalid challenge ID or challenge expired")]
    InvalidOrExpiredChallenge,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Internal server error during authentication")]
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingOrInvalidHeaders => StatusCode::UNAUTHORIZED,
            AuthError::InvalidBase64(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidPublicKey => StatusCode::BAD_REQUEST,
            AuthError::InvalidSignature => StatusCode::BAD_REQUEST,
            AuthError::InvalidOrExpiredChallenge => StatusCode::UNAUTHORIZED,
            AuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

// --- Authenticated Key Extractor ---

/// The verified ed25519 public key of the requester.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Vec<u8>);

pub const HEADER_PUBKEY: &str = "X-Blog-Pubkey-Base64";
pub const HEADER_SIGNATURE: &str = "X-Blog-Signature-Base64";
pub const HEADER_CHALLENGE_ID: &str = "X-Blog-Challenge-ID";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AuthError> {
    parts
        .headers
        .get(name)
        .ok_or(AuthError::MissingOrInvalidHeaders)?
        .to_str()
        .map_err(|_| AuthError::MissingOrInvalidHeaders)
}

fn has_credentials(parts: &Parts) -> bool {
    [HEADER_PUBKEY, HEADER_SIGNATURE, HEADER_CHALLENGE_ID]
        .iter()
        .any(|name| parts.headers.contains_key(*name))
}

fn verify(parts: &Parts, challenge_store: &ChallengeStore) -> Result<AuthenticatedUser, AuthError> {
    let pubkey_b64 = header(parts, HEADER_PUBKEY)?;
    let signature_b64 = header(parts, HEADER_SIGNATURE)?;
    let challenge_id_str = header(parts, HEADER_CHALLENGE_ID)?;

    let pubkey_bytes = BASE64_STANDARD.decode(pubkey_b64)?;
    let signature_bytes = BASE64_STANDARD.decode(signature_b64)?;

    // A malformed id can never match a stored challenge.
    let challenge_id =
        Uuid::parse_str(challenge_id_str).map_err(|_| AuthError::InvalidOrExpiredChallenge)?;

    let pubkey_array: &[u8; 32] = pubkey_bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(pubkey_array).map_err(|_| AuthError::InvalidPublicKey)?;

    let signature_array: &[u8; 64] = signature_bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::InvalidSignature)?;
    let signature = Signature::from_bytes(signature_array);

    // Consumes the challenge, so it must come after all cheap format checks.
    let nonce = challenge_store
        .use_challenge(challenge_id)
        .ok_or(AuthError::InvalidOrExpiredChallenge)?;

    verifying_key
        .verify(&nonce, &signature)
        .map_err(|_| AuthError::VerificationFailed)?;

    Ok(AuthenticatedUser(pubkey_bytes))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Challenges are single use, so a second extractor on the same request
        // must reuse the first verdict.
        if let Some(cached_result) = parts.extensions.get::<Result<Self, Self::Rejection>>() {
            debug!("Using cached authentication result");
            return cached_result.clone();
        }

        let app_state = AppState::from_ref(state);
        let result = verify(parts, &app_state.challenge_store);

        parts.extensions.insert(result.clone());
        debug!(authenticated = result.is_ok(), "Authentication attempted");
        result
    }
}

// --- Registered User Extractors ---

/// Why a login-required route refused the request.
#[derive(Debug)]
pub enum LoginRequired {
    /// No credentials, or a key nobody registered: send the client to log in.
    Redirect(String),
    Auth(AuthError),
    Internal,
}

impl IntoResponse for LoginRequired {
    fn into_response(self) -> Response {
        match self {
            LoginRequired::Redirect(location) => Redirect::to(&location).into_response(),
            LoginRequired::Auth(e) => e.into_response(),
            LoginRequired::Internal => AuthError::InternalError.into_response(),
        }
    }
}

fn login_redirect(login_url: &str, parts: &Parts) -> LoginRequired {
    let next = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    LoginRequired::Redirect(format!("{}{}next={}", login_url, separator, next))
}

/// The registered user making the request. Mutating routes require it.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = LoginRequired;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let login_url = &app_state.config.login_url;

        if !has_credentials(parts) {
            return Err(login_redirect(login_url, parts));
        }

        let key = AuthenticatedUser::from_request_parts(parts, state)
            .await
            .map_err(LoginRequired::Auth)?;

        match user_repository::get_user_by_public_key(&app_state.db_pool, &key.0).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                warn!(pubkey = %BASE64_STANDARD.encode(&key.0), "Authenticated key has no registered user");
                Err(login_redirect(login_url, parts))
            }
            Err(e) => {
                error!(error = %e, "Failed to look up user for authenticated key");
                Err(LoginRequired::Internal)
            }
        }
    }
}

/// The registered user if the request carries valid credentials, otherwise
/// an anonymous viewer. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !has_credentials(parts) {
            return Ok(MaybeUser(None));
        }
        Ok(MaybeUser(
            CurrentUser::from_request_parts(parts, state)
                .await
                .ok()
                .map(|CurrentUser(user)| user),
        ))
    }
}
