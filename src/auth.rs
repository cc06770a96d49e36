use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::AppConfig, models::Identity};

/// Claims
///
/// The payload of a Supabase access token. Only the fields needed to rebuild an
/// `Identity` on session restore are read.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the `auth.users.id` of the identity.
    pub sub: Uuid,
    /// Expiration Time (exp): validated on every restore.
    pub exp: usize,
    /// Issued At (iat).
    #[serde(default)]
    pub iat: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

/// Profile fields carried in GoTrue `user_metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// AuthGrant
///
/// The result of a successful credential check or token restore: who signed
/// in, the token to persist for later restoration and the instant it stops
/// being valid.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub identity: Identity,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Failures reported by the external auth collaborator. Callers decide how much
/// of this reaches the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthServiceError {
    #[error("rejected by auth service: {0}")]
    Rejected(String),
    #[error("auth service unreachable: {0}")]
    Transport(String),
    #[error("invalid or expired token")]
    InvalidToken,
}

/// AuthService
///
/// Contract of the hosted auth provider: credential sign-in, sign-up with
/// profile fields, sign-out, and restoration of a persisted session token.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, identifier: &str, secret: &str)
    -> Result<AuthGrant, AuthServiceError>;

    async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<Identity, AuthServiceError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError>;

    async fn restore(&self, access_token: &str) -> Result<AuthGrant, AuthServiceError>;
}

pub type AuthState = Arc<dyn AuthService>;

// --- Supabase GoTrue Implementation ---

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl GoTrueUser {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity {
            id: self.id,
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: self.user_metadata.full_name,
        }
    }
}

#[derive(Deserialize)]
struct GoTrueTokenResponse {
    access_token: String,
    /// Lifetime of `access_token` in seconds.
    expires_in: i64,
    /// Absolute expiry (unix seconds); newer GoTrue versions send it.
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

/// `/signup` answers with a full session when e-mail confirmation is disabled
/// and with the bare user record otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum GoTrueSignUpResponse {
    Session { user: GoTrueUser },
    User(GoTrueUser),
}

/// SupabaseAuthClient
///
/// `AuthService` over the Supabase GoTrue REST API. Restoration does not call
/// out: the persisted access token is verified locally against the project's
/// JWT secret.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    jwt_secret: String,
}

impl SupabaseAuthClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Pulls the human-readable message out of a GoTrue error body.
    async fn rejection(response: reqwest::Response) -> AuthServiceError {
        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        AuthServiceError::Rejected(message)
    }
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    async fn sign_in(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AuthGrant, AuthServiceError> {
        let response = self
            .http
            .post(self.url("token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": identifier, "password": secret }))
            .send()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let token = response
            .json::<GoTrueTokenResponse>()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        let expires_at = token
            .expires_at
            .and_then(|at| DateTime::from_timestamp(at, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(token.expires_in));

        Ok(AuthGrant {
            identity: token.user.into_identity(identifier),
            access_token: token.access_token,
            expires_at,
        })
    }

    async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<Identity, AuthServiceError> {
        let response = self
            .http
            .post(self.url("signup"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": identifier,
                "password": secret,
                "data": { "full_name": display_name },
            }))
            .send()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            // Duplicate e-mail, rejected password policy, disabled sign-ups...
            return Err(Self::rejection(response).await);
        }

        let user = match response
            .json::<GoTrueSignUpResponse>()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?
        {
            GoTrueSignUpResponse::Session { user } => user,
            GoTrueSignUpResponse::User(user) => user,
        };

        Ok(user.into_identity(identifier))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError> {
        let response = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(())
    }

    async fn restore(&self, access_token: &str) -> Result<AuthGrant, AuthServiceError> {
        let claims = decode_access_token(access_token, &self.jwt_secret)?;
        let expires_at = i64::try_from(claims.exp)
            .ok()
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .ok_or(AuthServiceError::InvalidToken)?;

        Ok(AuthGrant {
            identity: Identity {
                id: claims.sub,
                email: claims.email.unwrap_or_default(),
                display_name: claims.user_metadata.and_then(|m| m.full_name),
            },
            access_token: access_token.to_string(),
            expires_at,
        })
    }
}

/// decode_access_token
///
/// Validates signature and expiry of a persisted access token.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthServiceError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    // The session store expires sessions at `exp` sharp; restore must agree.
    validation.leeway = 0;
    // Supabase stamps `aud = "authenticated"`; the signature already binds the project.
    validation.validate_aud = false;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("persisted token expired"),
                _ => tracing::debug!(error = %e, "persisted token rejected"),
            }
            Err(AuthServiceError::InvalidToken)
        }
    }
}

// --- Mock Implementation (For Tests) ---

#[derive(Clone)]
struct MockAccount {
    identity: Identity,
    secret: String,
}

/// Lifetime of mock tokens unless overridden with `with_token_ttl`.
const MOCK_TOKEN_TTL_SECS: i64 = 3600;

/// MockAuthService
///
/// In-memory `AuthService`. Accounts are keyed by identifier; issued tokens map
/// back to their identity and expiry until signed out.
#[derive(Clone, Default)]
pub struct MockAuthService {
    /// When true, `sign_out` reports a transport failure.
    pub fail_sign_out: bool,
    token_ttl: Option<Duration>,
    accounts: Arc<Mutex<HashMap<String, MockAccount>>>,
    tokens: Arc<Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>>,
    sign_out_calls: Arc<AtomicUsize>,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_sign_out() -> Self {
        Self {
            fail_sign_out: true,
            ..Self::default()
        }
    }

    /// Tokens issued from now on expire after `ttl`.
    pub fn with_token_ttl(ttl: Duration) -> Self {
        Self {
            token_ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Registers an account directly, bypassing `sign_up`.
    pub fn seed_account(&self, identity: Identity, secret: &str) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                identity.email.clone(),
                MockAccount {
                    identity,
                    secret: secret.to_string(),
                },
            );
        }
    }

    /// Issues a token for a seeded identity without a credential check.
    pub fn issue_token(&self, identity_id: Uuid) -> String {
        self.issue(identity_id).0
    }

    fn issue(&self, identity_id: Uuid) -> (String, DateTime<Utc>) {
        let token = format!("mock-token-{}", Uuid::new_v4());
        let ttl = self
            .token_ttl
            .unwrap_or_else(|| Duration::seconds(MOCK_TOKEN_TTL_SECS));
        let expires_at = Utc::now() + ttl;
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(token.clone(), (identity_id, expires_at));
        }
        (token, expires_at)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn poisoned() -> AuthServiceError {
        AuthServiceError::Transport("mock auth poisoned".to_string())
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn sign_in(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AuthGrant, AuthServiceError> {
        let account = {
            let accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
            accounts.get(identifier).cloned()
        };
        match account {
            Some(account) if account.secret == secret => {
                let (access_token, expires_at) = self.issue(account.identity.id);
                Ok(AuthGrant {
                    identity: account.identity,
                    access_token,
                    expires_at,
                })
            }
            _ => Err(AuthServiceError::Rejected(
                "Invalid login credentials".to_string(),
            )),
        }
    }

    async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<Identity, AuthServiceError> {
        let mut accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
        if accounts.contains_key(identifier) {
            return Err(AuthServiceError::Rejected(
                "User already registered".to_string(),
            ));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: identifier.to_string(),
            display_name: Some(display_name.to_string()),
        };
        accounts.insert(
            identifier.to_string(),
            MockAccount {
                identity: identity.clone(),
                secret: secret.to_string(),
            },
        );
        Ok(identity)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(AuthServiceError::Transport(
                "Mock Auth Error: Simulation requested".to_string(),
            ));
        }
        let mut tokens = self.tokens.lock().map_err(|_| Self::poisoned())?;
        tokens.remove(access_token);
        Ok(())
    }

    async fn restore(&self, access_token: &str) -> Result<AuthGrant, AuthServiceError> {
        let (identity_id, expires_at) = {
            let tokens = self.tokens.lock().map_err(|_| Self::poisoned())?;
            tokens
                .get(access_token)
                .copied()
                .ok_or(AuthServiceError::InvalidToken)?
        };
        if expires_at <= Utc::now() {
            return Err(AuthServiceError::InvalidToken);
        }
        let accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
        accounts
            .values()
            .find(|account| account.identity.id == identity_id)
            .map(|account| AuthGrant {
                identity: account.identity.clone(),
                access_token: access_token.to_string(),
                expires_at,
            })
            .ok_or(AuthServiceError::InvalidToken)
    }
}
