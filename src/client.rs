use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use uuid::Uuid;

use crate::{
    AppState,
    config::{AppConfig, Env},
    session::{Session, SessionStore},
    submission::SubmissionForm,
};

/// Name of the session cookie.
pub const CLIENT_COOKIE: &str = "lab_sid";
/// Session record key holding the id of the browser's `ClientContext`.
pub const CLIENT_ID_KEY: &str = "client_id";
/// Session record key holding the access token, the restore source of a new
/// client context.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Upper bound of live client contexts; the least recently used go first.
const MAX_CLIENTS: u64 = 10_000;

/// The cookie-session record type handlers extract.
pub type CookieSession = tower_sessions::Session;

/// ClientContext
///
/// Everything one browser owns on the server: its session store and its
/// report submission form.
pub struct ClientContext {
    pub id: Uuid,
    pub store: SessionStore,
    pub form: Mutex<SubmissionForm>,
}

impl ClientContext {
    pub fn new(state: &AppState) -> Self {
        Self {
            id: Uuid::new_v4(),
            store: SessionStore::new(state.auth.clone(), state.repo.clone()),
            form: Mutex::new(SubmissionForm::new(
                state.storage.clone(),
                state.repo.clone(),
                state.previews.clone(),
                state.config.upload_success_display,
            )),
        }
    }
}

/// ClientRegistry
///
/// Live client contexts keyed by the id stored in their session record.
/// Entries idle for longer than the session idle timeout are evicted, and
/// dropping an entry releases its staged file.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Cache<Uuid, Arc<ClientContext>>,
}

impl ClientRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            clients: Cache::builder()
                .max_capacity(MAX_CLIENTS)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<ClientContext>> {
        self.clients.get(&id).await
    }

    pub async fn insert(&self, context: Arc<ClientContext>) {
        self.clients.insert(context.id, context).await;
    }

    pub async fn remove(&self, id: Uuid) {
        self.clients.invalidate(&id).await;
    }

    /// Number of live contexts, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.clients.run_pending_tasks().await;
        self.clients.entry_count()
    }
}

/// session_layer
///
/// Cookie-keyed session records with the same idle expiry as the client
/// registry. The record only stores ids and the access token; live state stays
/// in the `ClientContext`.
pub fn session_layer(store: MemoryStore, config: &AppConfig) -> SessionManagerLayer<MemoryStore> {
    let idle = time::Duration::try_from(config.session_idle_timeout).unwrap_or(time::Duration::HOUR);

    SessionManagerLayer::new(store)
        .with_name(CLIENT_COOKIE)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_secure(config.env == Env::Production)
        .with_expiry(Expiry::OnInactivity(idle))
}

/// client_context
///
/// Resolves the caller's `ClientContext` and injects it as an extension.
///
/// A browser without a live context gets a fresh one whose session starts
/// `Loading`. With an access token in its session record, restoration runs in
/// the background and handlers that need a settled session wait on
/// `SessionStore::ready`. Without one the session resolves to `Absent` at once.
///
/// Only contexts that end the request signed in or still restoring are kept;
/// anonymous traffic never grows the registry.
pub async fn client_context(
    State(state): State<AppState>,
    record: CookieSession,
    mut request: Request,
    next: Next,
) -> Response {
    let known = match record.get::<Uuid>(CLIENT_ID_KEY).await {
        Ok(Some(id)) => state.clients.get(id).await,
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "session record unreadable");
            None
        }
    };

    let (context, created) = match known {
        Some(context) => (context, false),
        None => {
            let context = Arc::new(ClientContext::new(&state));
            let persisted = record
                .get::<String>(ACCESS_TOKEN_KEY)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "persisted token unreadable");
                    None
                });

            match persisted {
                Some(token) => {
                    let restoring = context.clone();
                    tokio::spawn(async move {
                        restoring.store.restore(Some(token)).await;
                    });
                }
                None => {
                    context.store.restore(None).await;
                }
            }

            tracing::debug!(client_id = %context.id, "client context created");
            (context, true)
        }
    };

    request.extensions_mut().insert(context.clone());
    let response = next.run(request).await;

    if created && !matches!(context.store.current_session(), Session::Absent) {
        match record.insert(CLIENT_ID_KEY, context.id).await {
            Ok(()) => state.clients.insert(context).await,
            Err(e) => tracing::error!(error = %e, "client context not recorded"),
        }
    }
    response
}
