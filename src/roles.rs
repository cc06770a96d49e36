use uuid::Uuid;

use crate::{models::Role, repository::RepositoryState};

/// RoleResolver
///
/// Maps an authenticated identity to its single role by reading the
/// role-assignment table. Stateless and idempotent: the session store keeps
/// the resolved value for the lifetime of a session and calls back in on
/// every sign-in or restore.
#[derive(Clone)]
pub struct RoleResolver {
    repo: RepositoryState,
}

impl RoleResolver {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// `None` means the identity has no assignment row (incomplete sign-up).
    pub async fn resolve(&self, identity_id: Uuid) -> Option<Role> {
        let role = self.repo.get_role(identity_id).await;
        if role.is_none() {
            tracing::warn!(%identity_id, "identity has no role assignment");
        }
        role
    }
}
