use crate::{
    error::RepositoryError,
    models::{Module, NewSubmission, Role, SubmissionRecord},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for the tables this dashboard touches: the role
/// assignments, the profiles written at sign-up, the module catalogue and the
/// insert-only submission table. Handlers and services only see this trait.
///
/// Read paths log database errors and degrade to "nothing found"; write paths
/// propagate them, because a failed insert must surface to the user.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Roles ---
    // One row per identity in `user_roles`; `None` when the row is missing.
    async fn get_role(&self, user_id: Uuid) -> Option<Role>;
    async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<(), RepositoryError>;

    // --- Profiles ---
    async fn create_profile(&self, user_id: Uuid, full_name: &str) -> Result<(), RepositoryError>;

    // --- Modules ---
    async fn get_modules(&self) -> Vec<Module>;

    // --- Submissions ---
    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, RepositoryError>;
    // Newest first.
    async fn get_submissions(&self, user_id: Uuid) -> Vec<SubmissionRecord>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the Supabase Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_role(&self, user_id: Uuid) -> Option<Role> {
        sqlx::query_scalar::<_, Role>("SELECT role FROM user_roles WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_role error: {:?}", e);
                None
            })
    }

    /// assign_role
    ///
    /// Inserts the role assignment created at sign-up. A second assignment for
    /// the same identity is rejected so an identity never holds two roles.
    async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Rejected(format!(
                "identity {user_id} already has a role"
            )));
        }
        Ok(())
    }

    async fn create_profile(&self, user_id: Uuid, full_name: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO profiles (user_id, full_name) VALUES ($1, $2)")
            .bind(user_id)
            .bind(full_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_modules(&self) -> Vec<Module> {
        sqlx::query_as::<_, Module>(
            "SELECT id, module_number, title FROM modules ORDER BY module_number ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_modules error: {:?}", e);
            vec![]
        })
    }

    /// insert_submission
    ///
    /// `submitted_at` is assigned by the database clock.
    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            INSERT INTO submissions (id, user_id, module_id, file_url, file_name, file_size, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, user_id, module_id, file_url, file_name, file_size, submitted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission.user_id)
        .bind(submission.module_id)
        .bind(submission.file_url)
        .bind(submission.file_name)
        .bind(submission.file_size)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_submissions(&self, user_id: Uuid) -> Vec<SubmissionRecord> {
        sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT id, user_id, module_id, file_url, file_name, file_size, submitted_at
            FROM submissions
            WHERE user_id = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_submissions error: {:?}", e);
            vec![]
        })
    }
}
