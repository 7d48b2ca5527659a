use std::future::Future;

use crate::entry::{CatalogEntry, EntryPatch, NewEntry};
use crate::error::{AuthError, CatalogError};
use crate::types::{Credential, EntryId, Identity};

/// The remote catalog service, as seen by the session controller and the
/// reconciler.
///
/// Implementations are stateless request/response wrappers: no call mutates
/// local state. [`CatalogClient`](crate::CatalogClient) talks HTTP;
/// [`FakeCatalogService`](crate::testing::FakeCatalogService) is scriptable
/// for tests.
///
/// Catalog calls take an optional token: anonymous browsing sends no
/// `Authorization` header. Identity calls other than `login`/`register`
/// always require one.
pub trait CatalogService: Send + Sync + 'static {
    /// Exchange an email/password pair for a bearer token.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential, AuthError>> + Send;

    fn register(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Resolve the identity behind `token`.
    fn fetch_current_user(
        &self,
        token: &Credential,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn list_entries(
        &self,
        token: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<CatalogEntry>, CatalogError>> + Send;

    fn get_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> impl Future<Output = Result<CatalogEntry, CatalogError>> + Send;

    /// Create an entry; the result carries the server-assigned id.
    fn create_entry(
        &self,
        token: Option<&Credential>,
        entry: &NewEntry,
    ) -> impl Future<Output = Result<CatalogEntry, CatalogError>> + Send;

    fn update_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> impl Future<Output = Result<(), CatalogError>> + Send;

    fn delete_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> impl Future<Output = Result<(), CatalogError>> + Send;
}
