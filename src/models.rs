use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Domain Schemas ---

/// Role
///
/// The closed set of laboratory roles, stored in the `app_role` Postgres enum
/// and carried lowercase on the wire. An identity without a `user_roles` row has
/// no role at all (`Option<Role>::None`), never a fourth variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "app_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    /// Student attending the practicum.
    Praktikan,
    /// Lab assistant.
    Asisten,
    /// Lab coordinator.
    Koordinator,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Praktikan, Role::Asisten, Role::Koordinator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Praktikan => "praktikan",
            Role::Asisten => "asisten",
            Role::Koordinator => "koordinator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity
///
/// The authenticated user record as seen from this service. Owned by the
/// external auth provider (Supabase `auth.users`); read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// Module
///
/// A practicum module row from `public.modules`, offered in the report
/// submission form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Module {
    pub id: Uuid,
    pub module_number: i32,
    pub title: String,
}

/// SubmissionRecord
///
/// A persisted report submission from `public.submissions`. Immutable from
/// this service's point of view; grading columns are owned elsewhere and are
/// not selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
}

/// NewSubmission
///
/// Insert payload handed to the repository once the blob is stored.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for `POST /auth/login`. The secret is forwarded to the auth
/// provider and never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "a@x.edu")]
    pub identifier: String,
    pub secret: String,
}

/// SignUpRequest
///
/// Input payload for `POST /auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignUpRequest {
    pub identifier: String,
    pub secret: String,
    pub display_name: String,
    pub role: Role,
}

/// SubmitReportRequest
///
/// Input payload for `POST /upload-laporan/submit`. An empty `module_id`
/// means no module was picked in the selector.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmitReportRequest {
    #[serde(default)]
    pub module_id: String,
    #[serde(default)]
    pub notes: String,
}

// --- View Schemas (Output) ---

/// Notice
///
/// A transient, human-readable notification (a toast on the frontend). Every
/// non-authorization failure surfaces as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// SessionView
///
/// Serializable snapshot of the session for `GET /session` and the auth
/// endpoints. `status` is one of `loading`, `authenticated`, `anonymous`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionView {
    pub status: String,
    pub user: Option<Identity>,
    pub role: Option<Role>,
    pub role_label: String,
}

/// UserBadge
///
/// The user section of the dashboard sidebar.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserBadge {
    pub email: String,
    pub initials: String,
    pub role_label: String,
}

/// MenuEntry
///
/// One rendered navigation item; `active` is set on the entry whose path is
/// exactly the current path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MenuEntry {
    pub label: String,
    pub path: String,
    pub icon: String,
    pub active: bool,
}

/// PageView
///
/// The JSON rendering of a dashboard path once the route guard allowed it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PageView {
    pub path: String,
    pub title: String,
    /// One of `loading`, `login`, `landing`, `upload`, `placeholder`, `not-found`.
    pub kind: String,
    pub heading: String,
    pub description: String,
    pub menu: Vec<MenuEntry>,
    pub user: Option<UserBadge>,
}

/// StagedFileView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StagedFileView {
    pub file_name: String,
    pub file_size: u64,
    pub size_label: String,
    pub preview_url: String,
}

/// SubmissionFormView
///
/// Output of `GET /upload-laporan/form`: the controller state, the staged file
/// (if any), the selectable modules and the user's previous submissions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmissionFormView {
    /// One of `idle`, `staged`, `uploading`, `succeeded`, `failed`.
    pub state: String,
    pub staged: Option<StagedFileView>,
    pub modules: Vec<Module>,
    pub history: Vec<SubmissionRecord>,
}

/// SubmissionResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmissionResponse {
    pub record: SubmissionRecord,
    pub notice: Notice,
}
