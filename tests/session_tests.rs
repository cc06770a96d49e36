mod common;

use common::{MockRepoControl, identity};
use lab_dashboard::{
    auth::MockAuthService,
    error::AuthError,
    guard::{self, LANDING, Navigation, PUBLIC_ENTRY},
    models::Role,
    session::{Session, SessionStore},
};
use std::{sync::Arc, time::Duration};

fn store(auth: &MockAuthService, repo: &MockRepoControl) -> SessionStore {
    SessionStore::new(Arc::new(auth.clone()), Arc::new(repo.clone()))
}

#[tokio::test]
async fn test_store_starts_loading_until_restored() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let store = store(&auth, &repo);

    assert_eq!(store.current_session(), Session::Loading);
    assert_eq!(store.restore(None).await, Session::Absent);
    assert_eq!(store.ready().await, Session::Absent);
}

#[tokio::test]
async fn test_sign_up_then_sign_in_as_asisten() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let store = store(&auth, &repo);
    store.restore(None).await;

    store
        .sign_up("a@x.edu", "abcdef", "Andi", Role::Asisten)
        .await
        .unwrap();
    // Sign-up alone does not sign in.
    assert_eq!(store.current_session(), Session::Absent);

    let session = store.sign_in("a@x.edu", "abcdef").await.unwrap();
    assert_eq!(session.role(), Some(Role::Asisten));
    assert_eq!(session.identity().unwrap().email, "a@x.edu");
    assert_eq!(
        repo.profiles.lock().unwrap().values().next().map(String::as_str),
        Some("Andi")
    );

    assert_eq!(
        guard::navigate("/laporan-keuangan", &session),
        Navigation::Redirect(LANDING)
    );
    assert!(matches!(
        guard::navigate("/input-nilai", &session),
        Navigation::Render(_)
    ));
}

#[tokio::test]
async fn test_short_secret_is_rejected_before_contacting_auth() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let store = store(&auth, &repo);

    let result = store.sign_up("b@x.edu", "12345", "Budi", Role::Praktikan).await;

    assert_eq!(result, Err(AuthError::WeakSecret));
    // No account was created remotely, so signing in with any secret fails.
    assert_eq!(
        store.sign_in("b@x.edu", "12345").await,
        Err(AuthError::InvalidCredentials)
    );
    assert!(repo.roles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_sign_up_fails() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let store = store(&auth, &repo);

    store
        .sign_up("c@x.edu", "abcdef", "Citra", Role::Praktikan)
        .await
        .unwrap();
    let again = store.sign_up("c@x.edu", "abcdef", "Citra", Role::Praktikan).await;

    assert!(matches!(again, Err(AuthError::SignUpFailed(_))));
}

#[tokio::test]
async fn test_wrong_secret_is_invalid_credentials_and_keeps_state() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let user = identity("d@x.edu");
    auth.seed_account(user.clone(), "rahasia");
    repo.set_role(user.id, Role::Praktikan);
    let store = store(&auth, &repo);
    store.restore(None).await;

    assert_eq!(
        store.sign_in("d@x.edu", "salah").await,
        Err(AuthError::InvalidCredentials)
    );
    assert_eq!(
        store.sign_in("unknown@x.edu", "rahasia").await,
        Err(AuthError::InvalidCredentials)
    );
    assert_eq!(store.current_session(), Session::Absent);
}

#[tokio::test]
async fn test_sign_out_is_idempotent() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let user = identity("e@x.edu");
    auth.seed_account(user, "rahasia");
    let store = store(&auth, &repo);
    store.restore(None).await;

    store.sign_in("e@x.edu", "rahasia").await.unwrap();
    store.sign_out().await;
    store.sign_out().await;

    assert_eq!(store.current_session(), Session::Absent);
    assert_eq!(auth.sign_out_calls(), 1);
    assert_eq!(
        guard::navigate(LANDING, &store.current_session()),
        Navigation::Redirect(PUBLIC_ENTRY)
    );
}

#[tokio::test]
async fn test_sign_out_clears_locally_when_auth_call_fails() {
    let auth = MockAuthService::with_failing_sign_out();
    let repo = MockRepoControl::new();
    auth.seed_account(identity("f@x.edu"), "rahasia");
    let store = store(&auth, &repo);
    store.restore(None).await;

    store.sign_in("f@x.edu", "rahasia").await.unwrap();
    store.sign_out().await;

    assert_eq!(store.current_session(), Session::Absent);
}

#[tokio::test]
async fn test_restore_from_persisted_token() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let user = identity("g@x.edu");
    auth.seed_account(user.clone(), "rahasia");
    repo.set_role(user.id, Role::Koordinator);
    let token = auth.issue_token(user.id);

    let store = store(&auth, &repo);
    let session = store.restore(Some(token)).await;

    assert_eq!(session.identity(), Some(&user));
    assert_eq!(session.role(), Some(Role::Koordinator));
    assert!(matches!(
        guard::navigate("/pengaturan", &session),
        Navigation::Render(_)
    ));
}

#[tokio::test]
async fn test_restore_with_unknown_token_is_absent() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    let store = store(&auth, &repo);

    let session = store.restore(Some("mock-token-expired".to_string())).await;

    assert_eq!(session, Session::Absent);
}

#[tokio::test]
async fn test_identity_without_role_is_denied_restricted_routes() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    auth.seed_account(identity("h@x.edu"), "rahasia");
    let store = store(&auth, &repo);
    store.restore(None).await;

    let session = store.sign_in("h@x.edu", "rahasia").await.unwrap();

    assert_eq!(session.role(), None);
    assert!(matches!(guard::navigate(LANDING, &session), Navigation::Render(_)));
    assert_eq!(
        guard::navigate("/upload-laporan", &session),
        Navigation::Redirect(LANDING)
    );
}

#[tokio::test]
async fn test_subscribers_observe_every_transition() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    auth.seed_account(identity("i@x.edu"), "rahasia");
    let store = store(&auth, &repo);
    let mut rx = store.subscribe();

    store.restore(None).await;
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Session::Absent);

    store.sign_in("i@x.edu", "rahasia").await.unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().active().is_some());
}

#[tokio::test]
async fn test_late_restore_does_not_overwrite_sign_in() {
    let auth = MockAuthService::new();
    let repo = MockRepoControl::new();
    auth.seed_account(identity("j@x.edu"), "rahasia");
    let store = store(&auth, &repo);

    store.sign_in("j@x.edu", "rahasia").await.unwrap();
    let session = store.restore(None).await;

    assert!(session.active().is_some());
}

#[tokio::test]
async fn test_session_ends_when_its_token_expires() {
    let auth = MockAuthService::with_token_ttl(chrono::Duration::milliseconds(100));
    let repo = MockRepoControl::new();
    let user = identity("k@x.edu");
    auth.seed_account(user.clone(), "rahasia");
    repo.set_role(user.id, Role::Praktikan);
    let store = store(&auth, &repo);
    store.restore(None).await;
    let mut rx = store.subscribe();

    let session = store.sign_in("k@x.edu", "rahasia").await.unwrap();
    assert!(session.active().unwrap().expires_at().is_some());
    assert!(matches!(
        guard::navigate("/upload-laporan", &store.current_session()),
        Navigation::Render(_)
    ));
    let _ = rx.borrow_and_update();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(store.current_session(), Session::Absent);
    assert_eq!(store.ready().await, Session::Absent);
    assert_eq!(
        guard::navigate("/upload-laporan", &store.current_session()),
        Navigation::Redirect(PUBLIC_ENTRY)
    );
    // Subscribers see the expiry like any other transition.
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Session::Absent);
}

#[tokio::test]
async fn test_restore_rejects_token_past_its_expiry() {
    let auth = MockAuthService::with_token_ttl(chrono::Duration::milliseconds(50));
    let repo = MockRepoControl::new();
    let user = identity("l@x.edu");
    auth.seed_account(user.clone(), "rahasia");
    let token = auth.issue_token(user.id);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let store = store(&auth, &repo);

    assert_eq!(store.restore(Some(token)).await, Session::Absent);
}
