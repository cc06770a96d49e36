#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use lab_dashboard::{
    error::RepositoryError,
    models::{Identity, Module, NewSubmission, Role, SubmissionRecord},
    repository::Repository,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// In-memory stand-in for the Postgres tables. Shared through `Arc` so a test
// keeps a handle for assertions after handing a clone to the code under test.
#[derive(Clone, Default)]
pub struct MockRepoControl {
    pub roles: Arc<Mutex<HashMap<Uuid, Role>>>,
    pub profiles: Arc<Mutex<HashMap<Uuid, String>>>,
    pub submissions: Arc<Mutex<Vec<SubmissionRecord>>>,
    pub modules: Vec<Module>,
    // Simulates a database outage on writes.
    pub fail_writes: bool,
}

impl MockRepoControl {
    pub fn new() -> Self {
        Self {
            modules: vec![
                Module {
                    id: Uuid::new_v4(),
                    module_number: 1,
                    title: "Modul 1 - Pengenalan Algoritma".to_string(),
                },
                Module {
                    id: Uuid::new_v4(),
                    module_number: 2,
                    title: "Modul 2 - Struktur Data Array".to_string(),
                },
            ],
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn set_role(&self, user_id: Uuid, role: Role) {
        self.roles.lock().unwrap().insert(user_id, role);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn get_role(&self, user_id: Uuid) -> Option<Role> {
        self.roles.lock().unwrap().get(&user_id).copied()
    }

    async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<(), RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::Rejected("mock write failure".to_string()));
        }
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&user_id) {
            return Err(RepositoryError::Rejected("role already assigned".to_string()));
        }
        roles.insert(user_id, role);
        Ok(())
    }

    async fn create_profile(&self, user_id: Uuid, full_name: &str) -> Result<(), RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::Rejected("mock write failure".to_string()));
        }
        self.profiles
            .lock()
            .unwrap()
            .insert(user_id, full_name.to_string());
        Ok(())
    }

    async fn get_modules(&self) -> Vec<Module> {
        self.modules.clone()
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::Rejected("mock write failure".to_string()));
        }
        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            user_id: submission.user_id,
            module_id: submission.module_id,
            file_url: submission.file_url,
            file_name: submission.file_name,
            file_size: submission.file_size,
            submitted_at: Utc::now(),
        };
        self.submissions.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_submissions(&self, user_id: Uuid) -> Vec<SubmissionRecord> {
        let mut records: Vec<_> = self
            .submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }
}

// --- FIXTURES ---

pub fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        display_name: Some("Test User".to_string()),
    }
}
