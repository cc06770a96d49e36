use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::MemoryStore;
use tracing::{Level, Span};

// --- Module Structure ---

// External collaborators behind traits.
pub mod auth;
pub mod repository;
pub mod storage;

// Dashboard core: session, access control, navigation, report submission.
pub mod guard;
pub mod navigation;
pub mod roles;
pub mod session;
pub mod submission;

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

pub mod routes;
use routes::{public, upload};

// --- Public Re-exports ---

pub use auth::{AuthState, MockAuthService, SupabaseAuthClient};
pub use client::ClientRegistry;
pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};
pub use submission::PreviewRegistry;

/// ApiDoc
///
/// OpenAPI document of the dashboard API, served at `/api-docs/openapi.json`.
/// The guarded page fallback is not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::signup, handlers::logout, handlers::get_session,
        handlers::get_form, handlers::stage_file, handlers::remove_file,
        handlers::get_preview, handlers::submit_report
    ),
    components(
        schemas(
            models::Role, models::Identity, models::Module, models::SubmissionRecord,
            models::LoginRequest, models::SignUpRequest, models::SubmitReportRequest,
            models::Notice, models::SessionView, models::UserBadge, models::MenuEntry,
            models::PageView, models::StagedFileView, models::SubmissionFormView,
            models::SubmissionResponse,
        )
    ),
    tags(
        (name = "lab-dashboard", description = "Laboratory Dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container of every collaborator, the cookie
/// session records and the per-browser client registry.
#[derive(Clone)]
pub struct AppState {
    /// Role assignments, profiles, modules and submissions.
    pub repo: RepositoryState,
    /// Blob storage receiving the report files.
    pub storage: StorageState,
    /// Hosted auth provider.
    pub auth: AuthState,
    pub config: AppConfig,
    /// Cookie session records: client id and persisted access token.
    pub sessions: MemoryStore,
    /// Per-browser session stores and submission forms.
    pub clients: ClientRegistry,
    /// Live previews of staged files.
    pub previews: PreviewRegistry,
}

impl AppState {
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        auth: AuthState,
        config: AppConfig,
    ) -> Self {
        let clients = ClientRegistry::new(config.session_idle_timeout);
        Self {
            repo,
            storage,
            auth,
            config,
            sessions: MemoryStore::default(),
            clients,
            previews: PreviewRegistry::new(),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the API routes, the guarded page fallback and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Application Routes
    // Every route, the fallback included, resolves the caller's client context
    // from its cookie session record.
    let session_layer = client::session_layer(state.sessions.clone(), &state.config);
    let app_router = Router::new()
        .merge(public::public_routes())
        .nest("/upload-laporan", upload::upload_routes())
        .fallback(handlers::render_page)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            client::client_context,
        ))
        .layer(session_layer)
        .with_state(state);

    // 3. Probes and documentation stay outside the session layers.
    let base_router = Router::new()
        .merge(public::probe_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(app_router);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of one request carries the
/// `x-request-id` set by `SetRequestIdLayer`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
