use crate::{
    AppState,
    client::{ACCESS_TOKEN_KEY, ClientContext, CookieSession},
    error::{AppError, AuthorizationError},
    guard::{self, LANDING, Navigation, RouteSpec, UPLOAD_LAPORAN},
    models::{
        LoginRequest, Notice, PageView, Role, SessionView, SignUpRequest, SubmissionFormView,
        SubmissionResponse, SubmitReportRequest, UserBadge,
    },
    navigation::{compose, role_label, user_initials},
    session::Session,
    submission::{FileInput, InputSource, SubmissionForm},
};
use axum::{
    Extension, Json,
    extract::{Multipart, OriginalUri, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use std::{sync::Arc, time::Instant};
use uuid::Uuid;

/// Per-browser context injected by the `client_context` middleware.
type Client = Extension<Arc<ClientContext>>;

const PLACEHOLDER_DESCRIPTION: &str =
    "Halaman ini sedang dalam pengembangan dan akan segera tersedia.";

// --- Auth Handlers ---

/// login
///
/// [Public Route] Signs the client in and persists the access token in the
/// session record so a later client context can restore it. The session id is
/// rotated on every successful sign-in.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionView),
        (status = 401, description = "Invalid credentials", body = Notice)
    )
)]
pub async fn login(
    Extension(client): Client,
    record: CookieSession,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionView>, AppError> {
    client.store.ready().await;
    let session = client
        .store
        .sign_in(&payload.identifier, &payload.secret)
        .await?;

    if let Some(active) = session.active() {
        record.cycle_id().await?;
        record.insert(ACCESS_TOKEN_KEY, active.access_token()).await?;
    }
    Ok(Json(session.view()))
}

/// signup
///
/// [Public Route] Creates an account with the requested role. The client is
/// not signed in by this call.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = Notice),
        (status = 400, description = "Weak secret or rejected sign-up", body = Notice)
    )
)]
pub async fn signup(
    Extension(client): Client,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Notice>), AppError> {
    client
        .store
        .sign_up(
            &payload.identifier,
            &payload.secret,
            &payload.display_name,
            payload.role,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Notice::new(
            "Pendaftaran Berhasil",
            "Akun Anda telah dibuat. Silakan masuk.",
        )),
    ))
}

/// logout
///
/// [Public Route] Clears the session even if the auth provider is unreachable,
/// tears down the submission form, drops the client context and deletes the
/// session record.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Signed out", body = SessionView))
)]
pub async fn logout(
    Extension(client): Client,
    State(state): State<AppState>,
    record: CookieSession,
) -> Json<SessionView> {
    client.store.ready().await;
    client.store.sign_out().await;
    client.form.lock().await.discard();

    state.clients.remove(client.id).await;
    if let Err(e) = record.flush().await {
        tracing::warn!(error = %e, "session record not deleted");
    }
    Json(client.store.current_session().view())
}

/// get_session
///
/// [Public Route] Current snapshot; `loading` while restoration is running.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Session snapshot", body = SessionView))
)]
pub async fn get_session(Extension(client): Client) -> Json<SessionView> {
    Json(client.store.current_session().view())
}

// --- Dashboard Pages ---

/// render_page
///
/// Fallback for every path not matched by an API route: waits for the session
/// to settle, then applies the route guard. Denials and the signed-in visit to
/// the public entry answer with `307 Temporary Redirect`.
pub async fn render_page(Extension(client): Client, OriginalUri(uri): OriginalUri) -> Response {
    let path = uri.path();
    let session = match guard::navigate(path, &client.store.current_session()) {
        // Unknown paths never wait on restoration.
        Navigation::NotFound => client.store.current_session(),
        _ => client.store.ready().await,
    };

    match guard::navigate(path, &session) {
        Navigation::Redirect(target) => Redirect::temporary(target).into_response(),
        Navigation::Wait => Json(bare_view(path, "loading", "Memuat...", "")).into_response(),
        Navigation::RenderEntry => Json(bare_view(
            path,
            "login",
            "Masuk",
            "Masuk untuk mengakses dashboard laboratorium.",
        ))
        .into_response(),
        Navigation::Render(spec) => Json(page_view(spec, &session)).into_response(),
        Navigation::NotFound => (
            StatusCode::NOT_FOUND,
            Json(bare_view(
                path,
                "not-found",
                "404",
                "Halaman yang Anda cari tidak ditemukan.",
            )),
        )
            .into_response(),
    }
}

fn bare_view(path: &str, kind: &str, heading: &str, description: &str) -> PageView {
    PageView {
        path: path.to_string(),
        title: heading.to_string(),
        kind: kind.to_string(),
        heading: heading.to_string(),
        description: description.to_string(),
        menu: Vec::new(),
        user: None,
    }
}

fn page_view(spec: &RouteSpec, session: &Session) -> PageView {
    let role = session.role();
    let (kind, heading, description) = match spec.path {
        LANDING => {
            let (heading, description) = match role {
                Some(Role::Asisten) => (
                    "Selamat Datang, Asisten!",
                    "Kelola jadwal jaga, nilai, dan validasi absensi praktikan.",
                ),
                Some(Role::Koordinator) => (
                    "Selamat Datang, Koordinator!",
                    "Kelola seluruh operasional laboratorium dari sini.",
                ),
                _ => (
                    "Selamat Datang, Praktikan!",
                    "Pantau jadwal, absensi, dan tugas praktikum Anda di sini.",
                ),
            };
            ("landing", heading, description)
        }
        UPLOAD_LAPORAN => (
            "upload",
            spec.title,
            "Unggah laporan praktikum Anda dalam format PDF (maks. 5MB).",
        ),
        _ => ("placeholder", spec.title, PLACEHOLDER_DESCRIPTION),
    };

    PageView {
        path: spec.path.to_string(),
        title: spec.title.to_string(),
        kind: kind.to_string(),
        heading: heading.to_string(),
        description: description.to_string(),
        menu: compose(role, spec.path),
        user: session.identity().map(|identity| UserBadge {
            email: identity.email.clone(),
            initials: user_initials(&identity.email),
            role_label: role_label(role).to_string(),
        }),
    }
}

// --- Report Submission ---

/// Runs the route guard of the upload page for an API call.
async fn authorize_upload(client: &ClientContext) -> Result<Session, AppError> {
    let session = client.store.ready().await;
    let spec = guard::route_spec(UPLOAD_LAPORAN).ok_or(AppError::NotFound)?;
    guard::evaluate(spec, &session).into_result()?;
    Ok(session)
}

/// Reads modules and history first, then renders the form under a short lock.
async fn form_view(
    state: &AppState,
    client: &ClientContext,
    session: &Session,
) -> SubmissionFormView {
    let modules = state.repo.get_modules().await;
    let history = match session.identity() {
        Some(identity) => state.repo.get_submissions(identity.id).await,
        None => Vec::new(),
    };

    let mut form = client.form.lock().await;
    form.refresh(Instant::now());
    form.view(modules, history)
}

/// Locks the form for a staging change; rejected while a submission uploads.
async fn lock_for_staging(
    client: &ClientContext,
) -> Result<tokio::sync::MutexGuard<'_, SubmissionForm>, AppError> {
    let form = client.form.lock().await;
    if form.is_uploading() {
        return Err(AppError::Busy);
    }
    Ok(form)
}

/// get_form
///
/// [Praktikan Route] Form state (`uploading` included), the selectable modules
/// and the caller's previous submissions.
#[utoipa::path(
    get,
    path = "/upload-laporan/form",
    responses(
        (status = 200, description = "Submission form", body = SubmissionFormView),
        (status = 307, description = "Not signed in or not a praktikan")
    )
)]
pub async fn get_form(
    Extension(client): Client,
    State(state): State<AppState>,
) -> Result<Json<SubmissionFormView>, AppError> {
    let session = authorize_upload(&client).await?;
    Ok(Json(form_view(&state, &client, &session).await))
}

/// stage_file
///
/// [Praktikan Route] Stages one PDF from a multipart body with a `file` part
/// and an optional `source` part (`drop` or `picker`).
#[utoipa::path(
    post,
    path = "/upload-laporan/file",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File staged", body = SubmissionFormView),
        (status = 413, description = "File over 5MB", body = Notice),
        (status = 415, description = "Not a PDF", body = Notice),
        (status = 409, description = "Upload in progress", body = Notice)
    )
)]
pub async fn stage_file(
    Extension(client): Client,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmissionFormView>, AppError> {
    let session = authorize_upload(&client).await?;

    let mut source = InputSource::Picker;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("source") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                source = InputSource::parse(raw.trim());
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("laporan.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((file_name, content_type, bytes));
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing 'file' part".to_string()))?;

    lock_for_staging(&client).await?.stage_file(FileInput {
        file_name,
        content_type,
        bytes,
        source,
    })?;
    Ok(Json(form_view(&state, &client, &session).await))
}

/// remove_file
#[utoipa::path(
    delete,
    path = "/upload-laporan/file",
    responses(
        (status = 200, description = "Staged file removed", body = SubmissionFormView),
        (status = 409, description = "Upload in progress", body = Notice)
    )
)]
pub async fn remove_file(
    Extension(client): Client,
    State(state): State<AppState>,
) -> Result<Json<SubmissionFormView>, AppError> {
    let session = authorize_upload(&client).await?;
    lock_for_staging(&client).await?.remove_file();
    Ok(Json(form_view(&state, &client, &session).await))
}

/// get_preview
///
/// [Praktikan Route] Serves the caller's currently staged file. A released
/// preview is gone for good.
#[utoipa::path(
    get,
    path = "/upload-laporan/preview/{id}",
    params(("id" = Uuid, Path, description = "Preview id from the staged file view")),
    responses(
        (status = 200, description = "Staged file bytes"),
        (status = 404, description = "Preview released or unknown", body = Notice)
    )
)]
pub async fn get_preview(
    Extension(client): Client,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    authorize_upload(&client).await?;

    let owns_preview = {
        let form = client.form.lock().await;
        form.staged()
            .is_some_and(|staged| staged.preview().id() == id)
    };
    if !owns_preview {
        return Err(AppError::NotFound);
    }

    let (content_type, bytes) = state.previews.get(id).ok_or(AppError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// submit_report
///
/// [Praktikan Route] Uploads the staged file for the chosen module. A signed
/// out caller reaches the form preconditions so a missing module or file is
/// reported before the expired session. The form is not held while the blob
/// and the record are written; a second submit meanwhile is rejected with 409.
#[utoipa::path(
    post,
    path = "/upload-laporan/submit",
    request_body = SubmitReportRequest,
    responses(
        (status = 201, description = "Report submitted", body = SubmissionResponse),
        (status = 400, description = "Malformed module id", body = Notice),
        (status = 401, description = "Session expired", body = Notice),
        (status = 409, description = "Upload in progress", body = Notice),
        (status = 422, description = "Module or file missing", body = Notice),
        (status = 502, description = "Storage or database failure", body = Notice)
    )
)]
pub async fn submit_report(
    Extension(client): Client,
    Json(payload): Json<SubmitReportRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let session = client.store.ready().await;
    if let Some(spec) = guard::route_spec(UPLOAD_LAPORAN) {
        if session.active().is_some() && !spec.admits(session.role()) {
            return Err(AuthorizationError::WrongRole.into());
        }
    }

    let module_id = match payload.module_id.trim() {
        "" => None,
        raw => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::BadRequest(format!("invalid module id '{raw}'")))?,
        ),
    };

    let pending = client
        .form
        .lock()
        .await
        .begin_submit(module_id, &payload.notes, session.identity())?;
    let attempt = pending.attempt();
    let outcome = pending.run().await;
    let record = client.form.lock().await.finish(attempt, outcome)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            record,
            notice: Notice::new(
                "Laporan Berhasil Dikirim!",
                "Laporan Anda telah diunggah dan akan segera diperiksa.",
            ),
        }),
    ))
}
