use axum::body::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use uuid::Uuid;

use crate::{
    error::{SubmitError, ValidationError},
    models::{
        Identity, Module, NewSubmission, StagedFileView, SubmissionFormView, SubmissionRecord,
    },
    repository::RepositoryState,
    storage::StorageState,
};

/// The only accepted report content type.
pub const REPORT_CONTENT_TYPE: &str = "application/pdf";
/// Upload cap: 5 MiB.
pub const MAX_REPORT_BYTES: u64 = 5 * 1024 * 1024;

// --- Preview Handles ---

struct PreviewEntry {
    content_type: String,
    bytes: Bytes,
}

/// PreviewRegistry
///
/// Serves the local previews of staged files. Entries live exactly as long as
/// the `PreviewHandle` that registered them.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<HashMap<Uuid, PreviewEntry>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, content_type: &str, bytes: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                id,
                PreviewEntry {
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
        }
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// `(content_type, bytes)` of a live preview.
    pub fn get(&self, id: Uuid) -> Option<(String, Bytes)> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&id)
            .map(|entry| (entry.content_type.clone(), entry.bytes.clone()))
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    fn revoke(&self, id: Uuid) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&id);
        }
    }
}

/// PreviewHandle
///
/// Scoped preview resource of one staged file; revoked on drop.
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("/upload-laporan/preview/{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

// --- Staging ---

/// Which control the file came through. Both go through the same validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    DragDrop,
    Picker,
}

impl InputSource {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "drop" | "drag-drop" | "dragdrop" => InputSource::DragDrop,
            _ => InputSource::Picker,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileInput {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub source: InputSource,
}

pub struct StagedUpload {
    pub file_name: String,
    pub content_type: String,
    pub byte_size: u64,
    bytes: Bytes,
    preview: PreviewHandle,
}

impl StagedUpload {
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// validate_file
///
/// Checks the declared content type first, then the size cap.
pub fn validate_file(content_type: &str, byte_size: u64) -> Result<(), ValidationError> {
    if content_type != REPORT_CONTENT_TYPE {
        return Err(ValidationError::UnsupportedType(content_type.to_string()));
    }
    if byte_size > MAX_REPORT_BYTES {
        return Err(ValidationError::TooLarge(byte_size));
    }
    Ok(())
}

/// Human-readable size label: "B", "KB" with one decimal, "MB" with two.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// --- Controller ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Staged,
    Uploading,
    Succeeded { since: Instant },
    Failed,
}

impl FormState {
    pub fn name(&self) -> &'static str {
        match self {
            FormState::Idle => "idle",
            FormState::Staged => "staged",
            FormState::Uploading => "uploading",
            FormState::Succeeded { .. } => "succeeded",
            FormState::Failed => "failed",
        }
    }
}

/// PendingUpload
///
/// One in-flight submission, detached from its form so the form stays
/// readable while the blob and the record are written.
pub struct PendingUpload {
    attempt: u64,
    storage: StorageState,
    repo: RepositoryState,
    key: String,
    content_type: String,
    bytes: Bytes,
    user_id: Uuid,
    module_id: Uuid,
    file_name: String,
    file_size: i64,
}

impl PendingUpload {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Writes the blob first and the record referencing its location second.
    pub async fn run(self) -> Result<SubmissionRecord, SubmitError> {
        let file_url = self
            .storage
            .put_object(&self.key, self.bytes, &self.content_type)
            .await
            .map_err(|e| SubmitError::UploadFailed(e.to_string()))?;

        self.repo
            .insert_submission(NewSubmission {
                user_id: self.user_id,
                module_id: self.module_id,
                file_url,
                file_name: self.file_name,
                file_size: self.file_size,
            })
            .await
            .map_err(|e| SubmitError::UploadFailed(e.to_string()))
    }
}

/// SubmissionForm
///
/// Controller of the report upload form:
/// `idle -> staged -> uploading -> succeeded | failed`.
///
/// A submission is `begin_submit`, then `PendingUpload::run` without holding
/// the form, then `finish`. While one is uploading a second `begin_submit` is
/// rejected with `InProgress`. A failed submit keeps the staged file for retry.
/// A succeeded one keeps it on display until `refresh` observes that the
/// display delay has elapsed, then returns to idle.
pub struct SubmissionForm {
    storage: StorageState,
    repo: RepositoryState,
    previews: PreviewRegistry,
    success_display: Duration,
    state: FormState,
    staged: Option<StagedUpload>,
    attempts: u64,
}

impl SubmissionForm {
    pub fn new(
        storage: StorageState,
        repo: RepositoryState,
        previews: PreviewRegistry,
        success_display: Duration,
    ) -> Self {
        Self {
            storage,
            repo,
            previews,
            success_display,
            state: FormState::Idle,
            staged: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn staged(&self) -> Option<&StagedUpload> {
        self.staged.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.state == FormState::Uploading
    }

    /// stage_file
    ///
    /// Single entry point for drag-and-drop and picker input. A rejected file
    /// leaves the form exactly as it was; an accepted one replaces (and
    /// releases) any previously staged file.
    pub fn stage_file(&mut self, input: FileInput) -> Result<(), ValidationError> {
        let byte_size = input.bytes.len() as u64;
        if let Err(e) = validate_file(&input.content_type, byte_size) {
            tracing::debug!(source = ?input.source, error = %e, "file rejected");
            return Err(e);
        }

        let preview = self.previews.register(&input.content_type, input.bytes.clone());
        self.staged = Some(StagedUpload {
            file_name: input.file_name,
            content_type: input.content_type,
            byte_size,
            bytes: input.bytes,
            preview,
        });
        self.state = FormState::Staged;
        Ok(())
    }

    /// Discards the staged file, releasing its preview.
    pub fn remove_file(&mut self) {
        self.staged = None;
        self.state = FormState::Idle;
    }

    /// Completes the success display once its delay has elapsed.
    pub fn refresh(&mut self, now: Instant) {
        if let FormState::Succeeded { since } = self.state {
            if now.saturating_duration_since(since) >= self.success_display {
                self.remove_file();
            }
        }
    }

    /// begin_submit
    ///
    /// Preconditions are checked in order (module, file, identity) and leave the
    /// state untouched. On success the form is `Uploading` and the returned
    /// upload carries copies of everything it needs.
    pub fn begin_submit(
        &mut self,
        module_id: Option<Uuid>,
        notes: &str,
        acting_identity: Option<&Identity>,
    ) -> Result<PendingUpload, SubmitError> {
        self.refresh(Instant::now());
        if self.is_uploading() {
            return Err(SubmitError::InProgress);
        }

        let module_id = module_id.ok_or(SubmitError::ModuleNotSelected)?;
        let staged = self.staged.as_ref().ok_or(SubmitError::NoFileStaged)?;
        let identity = acting_identity.ok_or(SubmitError::SessionExpired)?;

        self.attempts += 1;
        let pending = PendingUpload {
            attempt: self.attempts,
            storage: self.storage.clone(),
            repo: self.repo.clone(),
            key: format!("reports/{}/{}/{}", identity.id, module_id, staged.file_name),
            content_type: staged.content_type.clone(),
            bytes: staged.bytes.clone(),
            user_id: identity.id,
            module_id,
            file_name: staged.file_name.clone(),
            file_size: staged.byte_size as i64,
        };

        self.state = FormState::Uploading;
        tracing::info!(
            identity_id = %identity.id,
            %module_id,
            file_size = pending.file_size,
            notes_len = notes.len(),
            "uploading report"
        );
        Ok(pending)
    }

    /// finish
    ///
    /// Commits the outcome of `attempt`. If the form was discarded or the file
    /// replaced meanwhile, the outcome is returned without touching the state.
    pub fn finish(
        &mut self,
        attempt: u64,
        outcome: Result<SubmissionRecord, SubmitError>,
    ) -> Result<SubmissionRecord, SubmitError> {
        if !self.is_uploading() || attempt != self.attempts {
            tracing::debug!(attempt, "stale upload outcome ignored");
            return outcome;
        }

        match &outcome {
            Ok(record) => {
                self.state = FormState::Succeeded {
                    since: Instant::now(),
                };
                tracing::info!(submission_id = %record.id, "report submitted");
            }
            Err(_) => self.state = FormState::Failed,
        }
        outcome
    }

    /// Runs a whole submission while holding the form.
    pub async fn submit(
        &mut self,
        module_id: Option<Uuid>,
        notes: &str,
        acting_identity: Option<&Identity>,
    ) -> Result<SubmissionRecord, SubmitError> {
        let pending = self.begin_submit(module_id, notes, acting_identity)?;
        let attempt = pending.attempt();
        let outcome = pending.run().await;
        self.finish(attempt, outcome)
    }

    /// Tears the form down: used on sign-out.
    pub fn discard(&mut self) {
        self.remove_file();
    }

    pub fn view(&self, modules: Vec<Module>, history: Vec<SubmissionRecord>) -> SubmissionFormView {
        SubmissionFormView {
            state: self.state.name().to_string(),
            staged: self.staged.as_ref().map(|staged| StagedFileView {
                file_name: staged.file_name.clone(),
                file_size: staged.byte_size,
                size_label: format_file_size(staged.byte_size),
                preview_url: staged.preview.url(),
            }),
            modules,
            history,
        }
    }
}
