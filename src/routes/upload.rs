use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Multipart bodies are allowed past the 5 MiB report cap so oversize files
/// reach validation and get the dedicated notice instead of a bare 413.
const UPLOAD_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Upload Router Module
///
/// The report submission flow under `/upload-laporan`. Access is decided per
/// handler with the same route guard that protects the page itself.
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        // GET /upload-laporan/form
        // Controller state, staged file, selectable modules and submission history.
        .route("/form", get(handlers::get_form))
        // POST/DELETE /upload-laporan/file
        // Stages (drag-and-drop or picker) or discards the report file.
        .route(
            "/file",
            post(handlers::stage_file).delete(handlers::remove_file),
        )
        // GET /upload-laporan/preview/{id}
        // Serves the staged file while its preview handle is alive.
        .route("/preview/{id}", get(handlers::get_preview))
        // POST /upload-laporan/submit
        .route("/submit", post(handlers::submit_report))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
