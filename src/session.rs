use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::watch;

use crate::{
    auth::{AuthGrant, AuthState},
    error::{AuthError, MIN_SECRET_LEN},
    models::{Identity, Role, SessionView},
    navigation::role_label,
    repository::RepositoryState,
    roles::RoleResolver,
};

/// ActiveSession
///
/// A resolved, signed-in session. The role is resolved once per sign-in or
/// restore and cached here; `None` marks an identity whose sign-up never
/// produced a role assignment.
///
/// `expires_at` is the access token's expiry; past it the session no longer
/// exists. A session built without one never expires.
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub identity: Identity,
    pub role: Option<Role>,
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl ActiveSession {
    pub fn new(identity: Identity, role: Option<Role>, access_token: impl Into<String>) -> Self {
        Self {
            identity,
            role,
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    fn from_grant(grant: AuthGrant, role: Option<Role>) -> Self {
        Self::new(grant.identity, role, grant.access_token).with_expiry(grant.expires_at)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("identity", &self.identity)
            .field("role", &self.role)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session
///
/// Tri-state authentication state: still restoring, resolved without a
/// session, or resolved with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Loading,
    Absent,
    Present(ActiveSession),
}

impl Session {
    pub fn is_loading(&self) -> bool {
        matches!(self, Session::Loading)
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            Session::Present(active) => Some(active),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.active().map(|active| &active.identity)
    }

    pub fn role(&self) -> Option<Role> {
        self.active().and_then(|active| active.role)
    }

    pub fn view(&self) -> SessionView {
        let status = match self {
            Session::Loading => "loading",
            Session::Absent => "anonymous",
            Session::Present(_) => "authenticated",
        };
        SessionView {
            status: status.to_string(),
            user: self.identity().cloned(),
            role: self.role(),
            role_label: role_label(self.role()).to_string(),
        }
    }
}

/// SessionStore
///
/// The single writer of a client's `Session`. Readers take snapshots with
/// `current_session` or observe changes through `subscribe`. The store starts
/// in `Loading` and stays there until `restore` has run; `ready` is the gate
/// every authorization decision waits on.
///
/// Token expiry is applied on read: the first snapshot taken after a
/// session's `expires_at` publishes `Absent` to every subscriber.
///
/// Mutations are not single-flight: two concurrent sign-ins race and the last
/// write wins.
pub struct SessionStore {
    auth: AuthState,
    roles: RoleResolver,
    repo: RepositoryState,
    tx: watch::Sender<Session>,
}

impl SessionStore {
    pub fn new(auth: AuthState, repo: RepositoryState) -> Self {
        let (tx, _rx) = watch::channel(Session::Loading);
        Self {
            auth,
            roles: RoleResolver::new(repo.clone()),
            repo,
            tx,
        }
    }

    pub fn current_session(&self) -> Session {
        let now = Utc::now();
        self.tx.send_if_modified(|current| {
            let expired = match &*current {
                Session::Present(active) if active.is_expired_at(now) => {
                    tracing::info!(identity_id = %active.identity.id, "session expired");
                    true
                }
                _ => false,
            };
            if expired {
                *current = Session::Absent;
            }
            expired
        });
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Waits until the initial restoration attempt has completed.
    pub async fn ready(&self) -> Session {
        let mut rx = self.tx.subscribe();
        // Fails only once the sender is gone, and `self` holds it.
        let _ = rx.wait_for(|session| !session.is_loading()).await;
        self.current_session()
    }

    /// restore
    ///
    /// Completes the `Loading` state from a persisted access token. A missing,
    /// expired or foreign token resolves to `Absent`. If a sign-in or sign-out
    /// already resolved the session, the restored result is dropped.
    pub async fn restore(&self, persisted_token: Option<String>) -> Session {
        let session = match persisted_token {
            None => Session::Absent,
            Some(token) => match self.auth.restore(&token).await {
                Ok(grant) => {
                    let role = self.roles.resolve(grant.identity.id).await;
                    tracing::debug!(identity_id = %grant.identity.id, ?role, "session restored");
                    Session::Present(ActiveSession::from_grant(grant, role))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "persisted session discarded");
                    Session::Absent
                }
            },
        };
        self.tx.send_if_modified(|current| {
            if current.is_loading() {
                *current = session;
                true
            } else {
                false
            }
        });
        self.current_session()
    }

    /// sign_in
    ///
    /// Any failure from the auth service collapses into `InvalidCredentials`;
    /// the cause is logged, never returned.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        let grant = self.auth.sign_in(identifier, secret).await.map_err(|e| {
            tracing::info!(error = %e, "sign-in rejected");
            AuthError::InvalidCredentials
        })?;

        let role = self.roles.resolve(grant.identity.id).await;
        tracing::info!(identity_id = %grant.identity.id, ?role, "signed in");

        let session = Session::Present(ActiveSession::from_grant(grant, role));
        self.publish(session.clone());
        Ok(session)
    }

    /// sign_up
    ///
    /// Creates the external identity, then its role assignment and profile.
    /// The session itself is left untouched; the user signs in afterwards.
    pub async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
        requested_role: Role,
    ) -> Result<(), AuthError> {
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret);
        }

        let identity = self
            .auth
            .sign_up(identifier, secret, display_name)
            .await
            .map_err(|e| AuthError::SignUpFailed(e.to_string()))?;

        self.repo
            .assign_role(identity.id, requested_role)
            .await
            .map_err(|e| AuthError::SignUpFailed(e.to_string()))?;

        if let Err(e) = self.repo.create_profile(identity.id, display_name).await {
            tracing::warn!(identity_id = %identity.id, error = %e, "profile row not created");
        }

        tracing::info!(identity_id = %identity.id, role = %requested_role, "signed up");
        Ok(())
    }

    /// sign_out
    ///
    /// Local state is cleared even when the auth service call fails.
    pub async fn sign_out(&self) {
        if let Session::Present(active) = self.current_session() {
            if let Err(e) = self.auth.sign_out(active.access_token()).await {
                tracing::warn!(error = %e, "remote sign-out failed; clearing local session");
            }
            tracing::info!(identity_id = %active.identity.id, "signed out");
        }
        self.publish(Session::Absent);
    }

    fn publish(&self, session: Session) {
        self.tx.send_replace(session);
    }
}
