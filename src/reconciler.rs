//! Confirm-then-apply catalog cache.
//!
//! Every mutation waits for the service to confirm it, then patches the
//! cached list in place. A single create, update or delete costs one request;
//! the list is never re-fetched to pick up the change.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::{CatalogEntry, EntryPatch, NewEntry};
use crate::error::{CatalogError, RejectsCredential};
use crate::notify::{Notifier, messages};
use crate::service::CatalogService;
use crate::types::{Credential, EntryId};

/// Ordered entries, most recently created first. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogCache {
    entries: Vec<CatalogEntry>,
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fetched list, keeping the first of any duplicate ids.
    #[must_use]
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut cache = Self::new();
        cache.replace_all(entries);
        cache
    }

    pub fn replace_all(&mut self, entries: Vec<CatalogEntry>) {
        self.entries.clear();
        self.entries.reserve(entries.len());
        for entry in entries {
            if self.position(&entry.id).is_some() {
                tracing::warn!(id = %entry.id, "Duplicate id in catalog listing, keeping first");
                continue;
            }
            self.entries.push(entry);
        }
    }

    /// Insert a confirmed entry at the front. An entry already cached under
    /// the same id is replaced.
    pub fn apply_create(&mut self, entry: CatalogEntry) {
        if let Some(index) = self.position(&entry.id) {
            self.entries.remove(index);
        }
        self.entries.insert(0, entry);
    }

    /// Merge a confirmed patch into the matching entry. Returns `false` if
    /// the id is not cached.
    pub fn apply_update(&mut self, id: &EntryId, patch: &EntryPatch) -> bool {
        match self.entries.iter_mut().find(|e| &e.id == id) {
            Some(entry) => {
                entry.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Drop a confirmed deletion. Returns `false` (and changes nothing) if
    /// the id is already gone.
    pub fn apply_remove(&mut self, id: &EntryId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, id: &EntryId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }
}

/// Outcome of the most recent list fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(CatalogError),
}

/// A destructive action awaiting confirmation.
///
/// Not `Clone`: confirming or cancelling consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingDeletion {
    id: EntryId,
}

impl PendingDeletion {
    #[must_use]
    pub fn id(&self) -> &EntryId {
        &self.id
    }
}

/// A confirmed deletion the service refused. The pending deletion is handed
/// back so the view can retry or cancel.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DeleteFailure {
    pub error: CatalogError,
    pub pending: PendingDeletion,
}

impl RejectsCredential for DeleteFailure {
    fn rejects_credential(&self) -> bool {
        self.error.rejects_credential()
    }
}

struct CacheState {
    cache: CatalogCache,
    status: LoadStatus,
    mounted: bool,
    /// Sequence number of the latest `load_all`.
    loads: u64,
}

/// Owns one view's catalog cache.
///
/// Create one per mount and call [`unmount`](Self::unmount) on teardown:
/// responses arriving afterwards are dropped instead of applied.
pub struct CatalogReconciler<C, N> {
    service: Arc<C>,
    notifier: N,
    state: Mutex<CacheState>,
}

impl<C, N> CatalogReconciler<C, N>
where
    C: CatalogService,
    N: Notifier,
{
    #[must_use]
    pub fn new(service: Arc<C>, notifier: N) -> Self {
        Self {
            service,
            notifier,
            state: Mutex::new(CacheState {
                cache: CatalogCache::new(),
                status: LoadStatus::Idle,
                mounted: true,
                loads: 0,
            }),
        }
    }

    /// Read-only copy of the cached entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CatalogEntry> {
        self.state.lock().cache.entries().to_vec()
    }

    #[must_use]
    pub fn get(&self, id: &EntryId) -> Option<CatalogEntry> {
        self.state.lock().cache.get(id).cloned()
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.state.lock().status.clone()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    /// Tear down: the cache is discarded and late responses are ignored.
    pub fn unmount(&self) {
        let mut state = self.state.lock();
        state.mounted = false;
        state.cache.clear();
        tracing::debug!("Catalog view unmounted");
    }

    /// Replace the cache with the service's full list.
    ///
    /// The remote result is returned as-is; applying it is skipped when the
    /// view unmounted or a newer `load_all` started meanwhile.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] from the service. `UnexpectedFormat`
    /// leaves the cache empty; other failures keep the last good list.
    pub async fn load_all(&self, token: Option<&Credential>) -> Result<(), CatalogError> {
        let load = {
            let mut state = self.state.lock();
            state.loads += 1;
            state.status = LoadStatus::Loading;
            state.loads
        };

        let result = self.service.list_entries(token).await;

        let mut state = self.state.lock();
        if !state.mounted || state.loads != load {
            tracing::debug!(load, "Discarding stale catalog listing");
            return result.map(drop);
        }

        match result {
            Ok(entries) => {
                state.cache.replace_all(entries);
                state.status = LoadStatus::Ready;
                tracing::debug!(entries = state.cache.len(), "Catalog loaded");
                Ok(())
            }
            Err(e) => {
                if matches!(e, CatalogError::UnexpectedFormat(_)) {
                    state.cache.clear();
                }
                state.status = LoadStatus::Failed(e.clone());
                drop(state);
                tracing::warn!(error = %e, "Catalog load failed");
                self.notifier.notify_error(messages::LOAD_FAILED);
                Err(e)
            }
        }
    }

    /// Insert a confirmed entry at the front. Ignored after unmount.
    pub fn apply_create(&self, entry: CatalogEntry) -> bool {
        self.commit("create", |cache| {
            cache.apply_create(entry);
            true
        })
    }

    /// Merge a confirmed patch. Ignored after unmount or for unknown ids.
    pub fn apply_update(&self, id: &EntryId, patch: &EntryPatch) -> bool {
        self.commit("update", |cache| cache.apply_update(id, patch))
    }

    /// Drop a confirmed deletion. A second removal of the same id is a no-op.
    pub fn apply_remove(&self, id: &EntryId) -> bool {
        self.commit("delete", |cache| cache.apply_remove(id))
    }

    /// Create remotely, then insert the server's entry at the front.
    ///
    /// # Errors
    ///
    /// Returns the service's [`CatalogError`]; the cache is untouched.
    pub async fn create(
        &self,
        token: Option<&Credential>,
        entry: &NewEntry,
    ) -> Result<CatalogEntry, CatalogError> {
        match self.service.create_entry(token, entry).await {
            Ok(created) => {
                tracing::info!(id = %created.id, title = %created.title, "Catalog entry created");
                self.apply_create(created.clone());
                self.notifier.notify_success(messages::CREATED);
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Catalog entry creation failed");
                self.notifier.notify_error(messages::CREATE_FAILED);
                Err(e)
            }
        }
    }

    /// Update remotely, then merge `patch` into the cached entry.
    ///
    /// # Errors
    ///
    /// Returns the service's [`CatalogError`]; the cache is untouched.
    pub async fn update(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> Result<(), CatalogError> {
        match self.service.update_entry(token, id, patch).await {
            Ok(()) => {
                tracing::info!(id = %id, "Catalog entry updated");
                self.apply_update(id, patch);
                self.notifier.notify_success(messages::UPDATED);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Catalog entry update failed");
                self.notifier.notify_error(messages::UPDATE_FAILED);
                Err(e)
            }
        }
    }

    /// Delete remotely, then drop the cached entry.
    ///
    /// # Errors
    ///
    /// Returns the service's [`CatalogError`]; the cache is untouched.
    pub async fn delete(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> Result<(), CatalogError> {
        match self.service.delete_entry(token, id).await {
            Ok(()) => {
                tracing::info!(id = %id, "Catalog entry deleted");
                self.apply_remove(id);
                self.notifier.notify_success(messages::DELETED);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Catalog entry deletion failed");
                self.notifier.notify_error(messages::DELETE_FAILED);
                Err(e)
            }
        }
    }

    /// Start the confirmation flow for deleting `id`.
    #[must_use]
    pub fn request_delete(&self, id: EntryId) -> PendingDeletion {
        tracing::debug!(id = %id, "Deletion requested");
        PendingDeletion { id }
    }

    /// Carry out a confirmed deletion.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteFailure`] holding the pending deletion if the
    /// service refused it.
    pub async fn confirm_delete(
        &self,
        token: Option<&Credential>,
        pending: PendingDeletion,
    ) -> Result<(), DeleteFailure> {
        match self.delete(token, &pending.id).await {
            Ok(()) => Ok(()),
            Err(error) => Err(DeleteFailure { error, pending }),
        }
    }

    pub fn cancel_delete(&self, pending: PendingDeletion) {
        tracing::debug!(id = %pending.id, "Deletion cancelled");
    }

    fn commit(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut CatalogCache) -> bool,
    ) -> bool {
        let mut state = self.state.lock();
        if !state.mounted {
            tracing::debug!(operation, "Discarding confirmation after unmount");
            return false;
        }
        let applied = apply(&mut state.cache);
        if !applied {
            tracing::debug!(operation, "Confirmation matched no cached entry");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{MemoryNotifier, Notification};
    use crate::testing::{FakeCatalogService, FakeFailure, Operation};
    use crate::types::Identity;

    fn entry(id: &str, title: &str) -> CatalogEntry {
        CatalogEntry {
            id: EntryId::from(id),
            title: title.into(),
            director: "D".into(),
            year: 2000,
            genre: "Drama".into(),
            description: None,
        }
    }

    fn ids(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn admin_token() -> Credential {
        Credential::new("admin-tok")
    }

    type Reconciler = CatalogReconciler<FakeCatalogService, MemoryNotifier>;

    fn setup(
        entries: Vec<CatalogEntry>,
    ) -> (Reconciler, Arc<FakeCatalogService>, MemoryNotifier) {
        let service = Arc::new(
            FakeCatalogService::new()
                .with_token("admin-tok", Identity::new("u1", true))
                .with_entries(entries),
        );
        let notifier = MemoryNotifier::new();
        let reconciler = CatalogReconciler::new(service.clone(), notifier.clone());
        (reconciler, service, notifier)
    }

    #[test]
    fn cache_create_goes_first_and_replaces_same_id() {
        let mut cache = CatalogCache::from_entries(vec![entry("m1", "A"), entry("m2", "B")]);
        cache.apply_create(entry("m3", "C"));
        assert_eq!(ids(cache.entries()), ["m3", "m1", "m2"]);

        cache.apply_create(entry("m2", "B2"));
        assert_eq!(ids(cache.entries()), ["m2", "m3", "m1"]);
        assert_eq!(cache.get(&EntryId::from("m2")).unwrap().title, "B2");
    }

    #[test]
    fn cache_listing_drops_duplicate_ids() {
        let cache =
            CatalogCache::from_entries(vec![entry("m1", "A"), entry("m1", "A'"), entry("m2", "B")]);
        assert_eq!(ids(cache.entries()), ["m1", "m2"]);
        assert_eq!(cache.entries()[0].title, "A");
    }

    #[test]
    fn cache_update_preserves_position_and_other_fields() {
        let mut cache = CatalogCache::from_entries(vec![entry("m1", "A"), entry("m2", "B")]);
        let patch = EntryPatch::new().title("B2").unwrap();

        assert!(cache.apply_update(&EntryId::from("m2"), &patch));
        assert!(!cache.apply_update(&EntryId::from("m9"), &patch));

        assert_eq!(ids(cache.entries()), ["m1", "m2"]);
        let updated = cache.get(&EntryId::from("m2")).unwrap();
        assert_eq!(updated.title, "B2");
        assert_eq!(updated.director, "D");
    }

    #[test]
    fn cache_remove_twice_is_noop() {
        let mut cache = CatalogCache::from_entries(vec![entry("m1", "A"), entry("m2", "B")]);
        assert!(cache.apply_remove(&EntryId::from("m1")));
        let after_first = cache.clone();

        assert!(!cache.apply_remove(&EntryId::from("m1")));
        assert_eq!(cache, after_first);
    }

    #[tokio::test]
    async fn load_all_populates_cache() {
        let (reconciler, _, _) = setup(vec![entry("m1", "X")]);

        reconciler.load_all(None).await.unwrap();

        assert_eq!(reconciler.snapshot(), vec![entry("m1", "X")]);
        assert_eq!(reconciler.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn unexpected_format_empties_cache_and_surfaces_error() {
        let (reconciler, service, notifier) = setup(vec![entry("m1", "X")]);
        reconciler.load_all(None).await.unwrap();
        service.fail_next(Operation::List, FakeFailure::UnexpectedFormat);

        let err = reconciler.load_all(None).await.unwrap_err();

        assert!(matches!(err, CatalogError::UnexpectedFormat(_)));
        assert!(reconciler.snapshot().is_empty());
        assert!(matches!(
            reconciler.status(),
            LoadStatus::Failed(CatalogError::UnexpectedFormat(_))
        ));
        assert_eq!(notifier.count(messages::LOAD_FAILED), 1);
    }

    #[tokio::test]
    async fn network_failure_keeps_last_good_list() {
        let (reconciler, service, _) = setup(vec![entry("m1", "X")]);
        reconciler.load_all(None).await.unwrap();
        service.fail_next(Operation::List, FakeFailure::Network);

        assert!(reconciler.load_all(None).await.is_err());
        assert_eq!(reconciler.snapshot(), vec![entry("m1", "X")]);
    }

    #[tokio::test]
    async fn create_applies_server_entry_after_confirmation() {
        let (reconciler, service, notifier) = setup(vec![entry("m1", "X")]);
        reconciler.load_all(None).await.unwrap();
        let input = NewEntry::new("Heat", "Michael Mann", 1995, "Crime").unwrap();

        let created = reconciler.create(Some(&admin_token()), &input).await.unwrap();

        let snapshot = reconciler.snapshot();
        assert_eq!(snapshot[0], created);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(service.call_count(Operation::List), 1);
        assert_eq!(notifier.count(messages::CREATED), 1);
    }

    #[tokio::test]
    async fn rejected_create_leaves_cache_untouched() {
        let (reconciler, service, notifier) = setup(vec![entry("m1", "X")]);
        reconciler.load_all(None).await.unwrap();
        service.fail_next(Operation::Create, FakeFailure::Rejected("duplicate title".into()));
        let input = NewEntry::new("X", "D", 2000, "Drama").unwrap();

        let err = reconciler.create(Some(&admin_token()), &input).await.unwrap_err();

        assert!(matches!(err, CatalogError::Rejected { operation: "create", .. }));
        assert_eq!(reconciler.snapshot(), vec![entry("m1", "X")]);
        assert_eq!(notifier.count(messages::CREATE_FAILED), 1);
    }

    #[tokio::test]
    async fn update_and_delete_patch_cache_without_refetch() {
        let (reconciler, service, _) = setup(vec![entry("m1", "A"), entry("m2", "B")]);
        reconciler.load_all(Some(&admin_token())).await.unwrap();
        let m1 = EntryId::from("m1");

        let patch = EntryPatch::new().title("A2").unwrap().year(1999).unwrap();
        reconciler.update(Some(&admin_token()), &m1, &patch).await.unwrap();
        reconciler.delete(Some(&admin_token()), &EntryId::from("m2")).await.unwrap();

        let snapshot = reconciler.snapshot();
        assert_eq!(ids(&snapshot), ["m1"]);
        assert_eq!(snapshot[0].title, "A2");
        assert_eq!(snapshot[0].year, 1999);
        assert_eq!(service.call_count(Operation::List), 1);
    }

    #[tokio::test]
    async fn anonymous_mutation_is_unauthorized() {
        let (reconciler, _, _) = setup(vec![entry("m1", "A")]);
        reconciler.load_all(None).await.unwrap();

        let err = reconciler.delete(None, &EntryId::from("m1")).await.unwrap_err();

        assert_eq!(err, CatalogError::Unauthorized);
        assert_eq!(reconciler.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn confirmed_deletion_flow() {
        let (reconciler, _, notifier) = setup(vec![entry("m1", "A"), entry("m2", "B")]);
        reconciler.load_all(None).await.unwrap();

        let pending = reconciler.request_delete(EntryId::from("m1"));
        reconciler.cancel_delete(pending);
        assert_eq!(reconciler.snapshot().len(), 2);

        let pending = reconciler.request_delete(EntryId::from("m1"));
        reconciler.confirm_delete(Some(&admin_token()), pending).await.unwrap();
        assert_eq!(ids(&reconciler.snapshot()), ["m2"]);
        assert_eq!(notifier.notifications(), vec![Notification::Success(messages::DELETED.into())]);
    }

    #[tokio::test]
    async fn failed_confirmation_hands_pending_back() {
        let (reconciler, service, _) = setup(vec![entry("m1", "A")]);
        reconciler.load_all(None).await.unwrap();
        service.fail_next(Operation::Delete, FakeFailure::Network);

        let pending = reconciler.request_delete(EntryId::from("m1"));
        let failure = reconciler
            .confirm_delete(Some(&admin_token()), pending)
            .await
            .unwrap_err();

        assert_eq!(failure.pending.id(), &EntryId::from("m1"));
        assert!(matches!(failure.error, CatalogError::Network(_)));
        assert_eq!(reconciler.snapshot().len(), 1);

        reconciler
            .confirm_delete(Some(&admin_token()), failure.pending)
            .await
            .unwrap();
        assert!(reconciler.snapshot().is_empty());
    }

    #[tokio::test]
    async fn duplicate_remove_confirmation_is_noop() {
        let (reconciler, _, _) = setup(vec![entry("m1", "A"), entry("m2", "B")]);
        reconciler.load_all(None).await.unwrap();
        let m1 = EntryId::from("m1");

        assert!(reconciler.apply_remove(&m1));
        let after_first = reconciler.snapshot();
        assert!(!reconciler.apply_remove(&m1));
        assert_eq!(reconciler.snapshot(), after_first);
    }

    #[tokio::test]
    async fn response_after_unmount_is_discarded() {
        let (reconciler, service, _) = setup(vec![entry("m1", "A")]);
        let gate = service.hold(Operation::List);

        let (result, ()) = tokio::join!(reconciler.load_all(None), async {
            reconciler.unmount();
            gate.notify_one();
        });

        assert!(result.is_ok());
        assert!(reconciler.snapshot().is_empty());
        assert_eq!(reconciler.status(), LoadStatus::Loading);
        assert!(!reconciler.apply_create(entry("m2", "B")));
    }

    #[tokio::test]
    async fn superseded_listing_is_discarded() {
        let (reconciler, service, _) = setup(vec![entry("m1", "A")]);
        let gate = service.hold(Operation::List);

        let (first, second) = tokio::join!(reconciler.load_all(None), async {
            service.insert_entry(entry("m2", "B"));
            let second = reconciler.load_all(None).await;
            gate.notify_one();
            second
        });

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(ids(&reconciler.snapshot()), ["m1", "m2"]);
        assert_eq!(reconciler.status(), LoadStatus::Ready);
    }

    mod proptest_cache {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        #[derive(Debug, Clone)]
        enum Op {
            Create(u8, String),
            Update(u8, String),
            Remove(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..6, "[a-z]{1,6}").prop_map(|(id, t)| Op::Create(id, t)),
                (0u8..6, "[a-z]{1,6}").prop_map(|(id, t)| Op::Update(id, t)),
                (0u8..6).prop_map(Op::Remove),
            ]
        }

        proptest! {
            /// Confirmed mutations leave one entry per surviving id, carrying
            /// the last confirmed title.
            #[test]
            fn confirmed_sequences_match_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
                let mut cache = CatalogCache::new();
                let mut model: HashMap<u8, String> = HashMap::new();
                let mut last_created = None;

                for op in ops {
                    match op {
                        Op::Create(id, title) => {
                            cache.apply_create(entry(&format!("m{id}"), &title));
                            model.insert(id, title);
                            last_created = Some(id);
                        }
                        Op::Update(id, title) => {
                            let patch = EntryPatch::new().title(title.clone()).unwrap();
                            let applied = cache.apply_update(&EntryId(format!("m{id}")), &patch);
                            prop_assert_eq!(applied, model.contains_key(&id));
                            if let Some(current) = model.get_mut(&id) {
                                *current = title;
                            }
                        }
                        Op::Remove(id) => {
                            let removed = cache.apply_remove(&EntryId(format!("m{id}")));
                            prop_assert_eq!(removed, model.remove(&id).is_some());
                            if last_created == Some(id) {
                                last_created = None;
                            }
                        }
                    }
                }

                prop_assert_eq!(cache.len(), model.len());
                for (id, title) in &model {
                    let cached = cache.get(&EntryId(format!("m{id}")));
                    prop_assert_eq!(cached.map(|e| e.title.as_str()), Some(title.as_str()));
                }
                if let Some(id) = last_created {
                    prop_assert_eq!(cache.entries()[0].id.as_str(), format!("m{id}"));
                }
            }
        }
    }
}
