//! Session, gate and reconciler working together over the in-memory service.

use std::sync::Arc;

use movieapp_client::testing::{FakeCatalogService, FakeFailure, Operation};
use movieapp_client::{
    CatalogEntry, CatalogError, CatalogReconciler, CredentialStore, EntryId, EntryPatch,
    FileCredentialStore, Identity, MemoryCredentialStore, MemoryNotifier, NewEntry, Notification,
    Route, SessionController, SessionState, ViewVariant, resolve_view,
};
use movieapp_client::notify::messages;

fn entry(id: &str, title: &str) -> CatalogEntry {
    CatalogEntry {
        id: EntryId::from(id),
        title: title.into(),
        director: "Director".into(),
        year: 2001,
        genre: "Drama".into(),
        description: None,
    }
}

fn service() -> Arc<FakeCatalogService> {
    Arc::new(
        FakeCatalogService::new()
            .with_account("admin@b.com", "pw", "admin-tok", Identity::new("u1", true))
            .with_account("member@b.com", "pw", "member-tok", Identity::new("u9", false))
            .with_entries(vec![entry("m1", "X")]),
    )
}

#[tokio::test]
async fn session_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();

    let first = SessionController::new(
        service.clone(),
        FileCredentialStore::new(dir.path()),
        MemoryNotifier::new(),
    );
    first.startup().await;
    first.login("member@b.com", "pw").await.unwrap();
    drop(first);

    let restarted = SessionController::new(
        service.clone(),
        FileCredentialStore::new(dir.path()),
        MemoryNotifier::new(),
    );
    let state = restarted.startup().await;

    assert_eq!(state, SessionState::Authenticated(Identity::new("u9", false)));
    assert_eq!(resolve_view(&Route::Movies, &state), ViewVariant::StandardView);
}

#[tokio::test]
async fn movies_route_waits_for_startup() {
    let service = service();
    let store = MemoryCredentialStore::with_token("admin-tok");
    let controller = SessionController::new(service, store, MemoryNotifier::new());
    let mut view = controller.view();

    assert_eq!(resolve_view(&Route::Movies, &view.current()), ViewVariant::Loading);

    let (_, settled) = tokio::join!(controller.startup(), view.settled());
    let settled = settled.unwrap();

    assert_eq!(resolve_view(&Route::Movies, &settled), ViewVariant::AdminView);
}

#[tokio::test]
async fn admin_flow_keeps_cache_in_step_without_refetch() {
    let service = service();
    let notifier = MemoryNotifier::new();
    let session =
        SessionController::new(service.clone(), MemoryCredentialStore::new(), notifier.clone());
    session.startup().await;
    session.login("admin@b.com", "pw").await.unwrap();
    let token = session.credential();

    let catalog = CatalogReconciler::new(service.clone(), notifier.clone());
    session.guard(catalog.load_all(token.as_ref()).await).unwrap();

    let created = session
        .guard(
            catalog
                .create(token.as_ref(), &NewEntry::new("Y", "Z", 2001, "Drama").unwrap())
                .await,
        )
        .unwrap();
    let patch = EntryPatch::new().genre("Thriller").unwrap();
    session
        .guard(catalog.update(token.as_ref(), &EntryId::from("m1"), &patch).await)
        .unwrap();
    let pending = catalog.request_delete(created.id.clone());
    session
        .guard(catalog.confirm_delete(token.as_ref(), pending).await)
        .unwrap();

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].genre, "Thriller");
    assert_eq!(snapshot, service.entries());
    assert_eq!(service.call_count(Operation::List), 1);
    assert_eq!(
        notifier.drain(),
        vec![
            Notification::Success(messages::LOGIN_SUCCEEDED.into()),
            Notification::Success(messages::CREATED.into()),
            Notification::Success(messages::UPDATED.into()),
            Notification::Success(messages::DELETED.into()),
        ]
    );
}

#[tokio::test]
async fn member_mutation_is_refused_and_cache_untouched() {
    let service = service();
    let session = SessionController::new(
        service.clone(),
        MemoryCredentialStore::new(),
        MemoryNotifier::new(),
    );
    session.startup().await;
    session.login("member@b.com", "pw").await.unwrap();
    let token = session.credential();
    let catalog = CatalogReconciler::new(service.clone(), MemoryNotifier::new());
    catalog.load_all(token.as_ref()).await.unwrap();

    let err = session
        .guard(catalog.delete(token.as_ref(), &EntryId::from("m1")).await)
        .unwrap_err();

    assert!(matches!(err, CatalogError::Rejected { .. }));
    assert!(session.state().identity().is_some());
    assert_eq!(catalog.snapshot(), vec![entry("m1", "X")]);
}

#[tokio::test]
async fn expired_token_mid_session_logs_out_once() {
    let service = service();
    let store = MemoryCredentialStore::new();
    let notifier = MemoryNotifier::new();
    let session = SessionController::new(service.clone(), store.clone(), notifier.clone());
    session.startup().await;
    session.login("admin@b.com", "pw").await.unwrap();
    let token = session.credential();
    let catalog = CatalogReconciler::new(service.clone(), notifier.clone());

    service.fail_next(Operation::List, FakeFailure::Unauthorized);
    service.fail_next(Operation::Delete, FakeFailure::Unauthorized);
    let list = session.guard(catalog.load_all(token.as_ref()).await);
    let delete = session.guard(catalog.delete(token.as_ref(), &EntryId::from("m1")).await);

    assert_eq!(list, Err(CatalogError::Unauthorized));
    assert_eq!(delete, Err(CatalogError::Unauthorized));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(notifier.count(messages::SESSION_EXPIRED), 1);
    assert_eq!(resolve_view(&Route::Movies, &session.state()), ViewVariant::StandardView);
}
