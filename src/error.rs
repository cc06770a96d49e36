use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::{
    guard::{LANDING, PUBLIC_ENTRY},
    models::Notice,
};

/// Minimum accepted length of a sign-up secret.
pub const MIN_SECRET_LEN: usize = 6;

/// AuthError
///
/// Failures of the session mutation entry points. `InvalidCredentials` is
/// deliberately opaque: it never says whether the identifier exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("secret must be at least 6 characters")]
    WeakSecret,
    #[error("sign-up failed: {0}")]
    SignUpFailed(String),
}

/// AuthorizationError
///
/// Route guard denials. These are always answered with a redirect and never
/// rendered as an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("role not permitted for this page")]
    WrongRole,
}

impl AuthorizationError {
    pub fn redirect_target(&self) -> &'static str {
        match self {
            AuthorizationError::Unauthenticated => PUBLIC_ENTRY,
            AuthorizationError::WrongRole => LANDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported content type '{0}'")]
    UnsupportedType(String),
    #[error("file of {0} bytes exceeds the upload cap")]
    TooLarge(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("no module selected")]
    ModuleNotSelected,
    #[error("no file staged")]
    NoFileStaged,
    #[error("session expired")]
    SessionExpired,
    #[error("a submission is already uploading")]
    InProgress,
    #[error("upload failed: {0}")]
    UploadFailed(String),
}

/// Blob storage failure, as reported by the storage client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Rejected(String),
}

/// AppError
///
/// The user-facing error surface of the HTTP layer. Each variant maps to a
/// status code and an Indonesian notice mirroring the dashboard's toasts.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Denied(#[from] AuthorizationError),
    #[error("not found")]
    NotFound,
    #[error("a submission is already in progress")]
    Busy,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("session record error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::Auth(AuthError::WeakSecret) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::SignUpFailed(_)) => StatusCode::BAD_REQUEST,
            AppError::Validation(ValidationError::TooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(ValidationError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            AppError::Submit(SubmitError::SessionExpired) => StatusCode::UNAUTHORIZED,
            AppError::Submit(SubmitError::UploadFailed(_)) => StatusCode::BAD_GATEWAY,
            AppError::Submit(SubmitError::InProgress) => StatusCode::CONFLICT,
            AppError::Submit(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Denied(_) => StatusCode::TEMPORARY_REDIRECT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            AppError::Auth(AuthError::InvalidCredentials) => {
                Notice::new("Login Gagal", "Email atau password salah.")
            }
            AppError::Auth(AuthError::WeakSecret) => Notice::new(
                "Pendaftaran Gagal",
                format!("Password minimal {MIN_SECRET_LEN} karakter."),
            ),
            AppError::Auth(AuthError::SignUpFailed(detail)) => {
                Notice::new("Pendaftaran Gagal", detail.clone())
            }
            AppError::Validation(ValidationError::UnsupportedType(_)) => {
                Notice::new("File Tidak Valid", "Hanya file PDF yang diperbolehkan.")
            }
            AppError::Validation(ValidationError::TooLarge(_)) => {
                Notice::new("File Tidak Valid", "Ukuran file maksimal 5MB.")
            }
            AppError::Submit(SubmitError::ModuleNotSelected) => Notice::new(
                "Modul Belum Dipilih",
                "Silakan pilih modul yang akan dilaporkan.",
            ),
            AppError::Submit(SubmitError::NoFileStaged) => Notice::new(
                "File Belum Diunggah",
                "Silakan unggah file laporan Anda.",
            ),
            AppError::Submit(SubmitError::SessionExpired) => {
                Notice::new("Sesi Berakhir", "Silakan masuk kembali.")
            }
            AppError::Submit(SubmitError::UploadFailed(_)) => Notice::new(
                "Gagal Mengunggah",
                "Terjadi kesalahan. Silakan coba lagi.",
            ),
            AppError::Denied(_) => Notice::new("Akses Ditolak", "Silakan masuk kembali."),
            AppError::NotFound => Notice::new("Tidak Ditemukan", "Halaman tidak ditemukan."),
            AppError::Busy | AppError::Submit(SubmitError::InProgress) => Notice::new(
                "Sedang Mengunggah",
                "Tunggu hingga unggahan sebelumnya selesai.",
            ),
            AppError::BadRequest(detail) => Notice::new("Permintaan Tidak Valid", detail.clone()),
            AppError::Session(_) => Notice::new(
                "Terjadi Kesalahan",
                "Sesi tidak dapat disimpan. Silakan coba lagi.",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Denied(denial) = &self {
            tracing::debug!(reason = %denial, "request redirected");
            return Redirect::temporary(denial.redirect_target()).into_response();
        }

        // Upstream detail stays in the logs; the notice carries only UI copy.
        match &self {
            AppError::Submit(SubmitError::UploadFailed(detail)) => {
                tracing::error!(error = %detail, "report upload failed");
            }
            AppError::Auth(AuthError::SignUpFailed(detail)) => {
                tracing::warn!(error = %detail, "sign-up rejected");
            }
            AppError::Session(e) => tracing::error!(error = %e, "session record not saved"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }
        (self.status(), Json(self.notice())).into_response()
    }
}
