use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Probe Router
///
/// Mounted outside the session layers: probes never create a session record
/// or a client context.
pub fn probe_routes() -> Router {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; answers without touching any collaborator.
        .route("/health", get(|| async { "ok" }))
}

/// Public Router Module
///
/// Endpoints reachable without a session. Each still runs behind the
/// `client_context` middleware so sign-in and sign-out mutate the caller's own
/// session store.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/login
        // Signs in through the hosted auth provider and records the access token.
        .route("/auth/login", post(handlers::login))
        // POST /auth/signup
        // Creates the identity, its role assignment and its profile row.
        .route("/auth/signup", post(handlers::signup))
        // POST /auth/logout
        // Always ends in the signed-out state, even when the provider call fails.
        .route("/auth/logout", post(handlers::logout))
        // GET /session
        .route("/session", get(handlers::get_session))
}
