//! Authentication service: credential checks, sign-up, and bearer tokens.
//!
//! Password checks run on a dedicated [`Dispatcher`] pool with a handoff
//! queue, so a burst of logins waits for a free worker instead of piling
//! up. Registration, recovery, and social sign-in are cheap and run inline
//! on the caller's task after a context check.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::context::CallContext;
use crate::dispatch::{Dispatcher, JobHandler, PoolOptions, QueueMode};
use crate::domain::UserRepository;
use crate::error::ServiceError;
use crate::observability::{AUTH_QUEUE_DEPTH, SharedMetrics};

/// Social sign-in providers accepted by [`AuthService::social_authenticate`].
pub const SOCIAL_PROVIDERS: [&str; 3] = ["google", "apple", "facebook"];

const TOKEN_BYTES: usize = 20;

/// Issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Opaque bearer token.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Trims and lower-cases an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hex-encoded SHA-256 digest of `password`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[derive(Debug, Clone)]
struct Session {
    subject: String,
    expires_at: DateTime<Utc>,
}

/// In-process bearer token registry.
#[derive(Debug)]
pub struct TokenStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl TokenStore {
    /// Creates a store whose tokens live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh random token for `subject`.
    pub fn issue(&self, subject: &str) -> AuthResponse {
        let token = to_hex(&rand::random::<[u8; TOKEN_BYTES]>());
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut sessions = self.sessions.lock();
        let now = Utc::now();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                subject: subject.to_string(),
                expires_at,
            },
        );
        AuthResponse { token, expires_at }
    }

    /// Resolves `token` to its subject.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] if the token is unknown or
    /// expired.
    pub fn verify(&self, token: &str) -> Result<String, ServiceError> {
        let mut sessions = self.sessions.lock();
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.subject.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(ServiceError::Unauthorized)
            }
            None => Err(ServiceError::Unauthorized),
        }
    }
}

#[derive(Debug)]
struct Credentials {
    email: String,
    password: String,
}

struct PasswordCheck {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenStore>,
}

#[async_trait]
impl JobHandler for PasswordCheck {
    type Input = Credentials;
    type Output = Result<AuthResponse, ServiceError>;

    async fn handle(&self, _ctx: &CallContext, input: Credentials) -> Self::Output {
        let email = normalize_email(&input.email);
        match self.users.password_hash(&email).await? {
            Some(stored) if stored == hash_password(&input.password) => {
                Ok(self.tokens.issue(&email))
            }
            _ => Err(ServiceError::InvalidCredentials),
        }
    }
}

/// Login, sign-up, recovery, and token verification.
pub struct AuthService {
    pool: Dispatcher<PasswordCheck>,
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenStore>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Starts `workers` credential-check workers.
    #[must_use]
    pub fn new(
        workers: usize,
        token_ttl: Duration,
        users: Arc<dyn UserRepository>,
        metrics: SharedMetrics,
    ) -> Self {
        let tokens = Arc::new(TokenStore::new(token_ttl));
        let pool = Dispatcher::new(
            PoolOptions {
                name: "auth",
                depth_gauge: AUTH_QUEUE_DEPTH,
                workers,
                queue: QueueMode::Handoff,
            },
            PasswordCheck {
                users: Arc::clone(&users),
                tokens: Arc::clone(&tokens),
            },
            metrics,
        );
        Self {
            pool,
            users,
            tokens,
        }
    }

    /// Checks `email`/`password` on the worker pool and issues a token.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCredentials`] on mismatch and
    /// [`ServiceError::Dispatch`] if `ctx` ends or the pool is closed.
    pub async fn authenticate(
        &self,
        ctx: &CallContext,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ServiceError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.pool.submit(ctx, credentials).await?
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCredentials`] for a blank email or
    /// password, [`ServiceError::EmailConflict`] if the email is taken, or
    /// the context error if `ctx` is already done.
    pub async fn register(
        &self,
        ctx: &CallContext,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ServiceError> {
        ctx.check()?;
        let email = normalize_email(email);
        if email.is_empty() || password.trim().is_empty() {
            return Err(ServiceError::InvalidCredentials);
        }
        self.users.create(&email, &hash_password(password)).await?;
        tracing::info!(email = %email, "account registered");
        Ok(self.tokens.issue(&email))
    }

    /// Confirms an account exists before a recovery email would be sent.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCredentials`] if no account matches.
    pub async fn recover(&self, ctx: &CallContext, email: &str) -> Result<(), ServiceError> {
        ctx.check()?;
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServiceError::InvalidCredentials);
        }
        match self.users.password_hash(&email).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::InvalidCredentials),
        }
    }

    /// Issues a token for a federated provider.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedProvider`] unless `provider` is
    /// one of [`SOCIAL_PROVIDERS`].
    pub fn social_authenticate(
        &self,
        ctx: &CallContext,
        provider: &str,
    ) -> Result<AuthResponse, ServiceError> {
        ctx.check()?;
        if !SOCIAL_PROVIDERS.contains(&provider) {
            return Err(ServiceError::UnsupportedProvider);
        }
        Ok(self.tokens.issue(provider))
    }

    /// Resolves a bearer token to its subject.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for unknown or expired tokens.
    pub fn verify_token(&self, token: &str) -> Result<String, ServiceError> {
        self.tokens.verify(token)
    }

    /// Closes the credential-check pool and waits for its workers.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
