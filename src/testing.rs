//! In-memory [`CatalogService`] for tests.
//!
//! [`FakeCatalogService`] keeps accounts, tokens and entries in memory and
//! enforces the same rules the hosted service does:
//!
//! - catalog reads accept no token, but reject an unknown one
//! - mutations need a known token whose identity is privileged
//! - registering an existing email fails
//!
//! Failures can be scripted per operation with
//! [`fail_next`](FakeCatalogService::fail_next), and a call can be held
//! mid-flight with [`hold`](FakeCatalogService::hold) to exercise late
//! responses.
//!
//! # Example
//!
//! ```
//! use movieapp_client::testing::{FakeCatalogService, Operation};
//! use movieapp_client::{CatalogService, Identity};
//!
//! # tokio_test_block(async {
//! let service = FakeCatalogService::new()
//!     .with_account("a@b.com", "pw", "tok1", Identity::new("u1", true));
//!
//! let token = service.login("a@b.com", "pw").await.unwrap();
//! let identity = service.fetch_current_user(&token).await.unwrap();
//! assert!(identity.is_privileged);
//! assert_eq!(service.call_count(Operation::Login), 1);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::entry::{CatalogEntry, EntryPatch, NewEntry};
use crate::error::{AuthError, CatalogError};
use crate::service::CatalogService;
use crate::types::{Credential, EntryId, Identity, SubjectId};

/// Service operations, for scripting and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Register,
    FetchCurrentUser,
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::FetchCurrentUser => "details",
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A scripted failure, translated to the operation's error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    Network,
    Unauthorized,
    /// The service refused the request with this reason.
    Rejected(String),
    UnexpectedFormat,
}

impl FakeFailure {
    fn into_auth(self, operation: Operation) -> AuthError {
        match self {
            Self::Network => AuthError::Network("connection reset".into()),
            Self::Unauthorized => AuthError::Unauthorized,
            Self::Rejected(reason) => match operation {
                Operation::Login => AuthError::InvalidCredentials,
                Operation::Register => AuthError::RegistrationFailed(Some(reason)),
                _ => AuthError::Unauthorized,
            },
            Self::UnexpectedFormat => AuthError::UnexpectedResponse("malformed body".into()),
        }
    }

    fn into_catalog(self, operation: Operation) -> CatalogError {
        match self {
            Self::Network => CatalogError::Network("connection reset".into()),
            Self::Unauthorized => CatalogError::Unauthorized,
            Self::Rejected(detail) => CatalogError::Rejected {
                operation: operation.label(),
                detail,
            },
            Self::UnexpectedFormat => CatalogError::UnexpectedFormat("malformed body".into()),
        }
    }
}

struct Account {
    password: String,
    token: Credential,
}

#[derive(Default)]
struct FakeState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<Credential, Identity>,
    entries: Vec<CatalogEntry>,
    next_id: u64,
    calls: Vec<Operation>,
    failures: HashMap<Operation, VecDeque<FakeFailure>>,
    holds: HashMap<Operation, Arc<Notify>>,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Record the call and take any scripted failure and hold for it.
    fn begin(&mut self, operation: Operation) -> (Option<FakeFailure>, Option<Arc<Notify>>) {
        self.calls.push(operation);
        let failure = self
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        (failure, self.holds.remove(&operation))
    }

    fn reader(&self, token: Option<&Credential>) -> Result<(), CatalogError> {
        match token {
            Some(token) if !self.tokens.contains_key(token) => Err(CatalogError::Unauthorized),
            _ => Ok(()),
        }
    }

    fn writer(&self, token: Option<&Credential>, operation: Operation) -> Result<(), CatalogError> {
        let identity = token
            .and_then(|t| self.tokens.get(t))
            .ok_or(CatalogError::Unauthorized)?;
        if identity.is_privileged {
            Ok(())
        } else {
            Err(CatalogError::Rejected {
                operation: operation.label(),
                detail: "Action Forbidden".into(),
            })
        }
    }

    fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }
}

/// Scriptable in-memory catalog service.
#[derive(Default)]
pub struct FakeCatalogService {
    state: Mutex<FakeState>,
}

impl FakeCatalogService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `identity`.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>, identity: Identity) -> Self {
        self.state
            .lock()
            .tokens
            .insert(Credential::new(token), identity);
        self
    }

    /// Register an account that logs in with `token`.
    #[must_use]
    pub fn with_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
        token: impl Into<String>,
        identity: Identity,
    ) -> Self {
        let token = Credential::new(token);
        {
            let mut state = self.state.lock();
            state.tokens.insert(token.clone(), identity);
            state.accounts.insert(
                email.into(),
                Account {
                    password: password.into(),
                    token,
                },
            );
        }
        self
    }

    #[must_use]
    pub fn with_entries(self, entries: Vec<CatalogEntry>) -> Self {
        self.state.lock().entries = entries;
        self
    }

    /// Server-side insert that bypasses authorization.
    pub fn insert_entry(&self, entry: CatalogEntry) {
        self.state.lock().entries.push(entry);
    }

    /// Fail the next call of `operation`. Repeated calls queue up.
    pub fn fail_next(&self, operation: Operation, failure: FakeFailure) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(failure);
    }

    /// Hold the next call of `operation` until the returned handle is
    /// notified. The response is computed before the hold.
    pub fn hold(&self, operation: Operation) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.state.lock().holds.insert(operation, notify.clone());
        notify
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Operation> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Server-side entries, in storage order.
    #[must_use]
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.state.lock().entries.clone()
    }

    /// Run `respond` under the state lock, then wait out any hold.
    async fn call<T, E>(
        &self,
        operation: Operation,
        fail: impl FnOnce(FakeFailure) -> E,
        respond: impl FnOnce(&mut FakeState) -> Result<T, E>,
    ) -> Result<T, E> {
        let (result, hold) = {
            let mut state = self.state.lock();
            let (failure, hold) = state.begin(operation);
            let result = match failure {
                Some(failure) => Err(fail(failure)),
                None => respond(&mut *state),
            };
            (result, hold)
        };
        if let Some(hold) = hold {
            hold.notified().await;
        }
        result
    }
}

impl CatalogService for FakeCatalogService {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        self.call(
            Operation::Login,
            |f| f.into_auth(Operation::Login),
            |state| match state.accounts.get(email) {
                Some(account) if account.password == password => Ok(account.token.clone()),
                _ => Err(AuthError::InvalidCredentials),
            },
        )
        .await
    }

    async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.call(
            Operation::Register,
            |f| f.into_auth(Operation::Register),
            |state| {
                if state.accounts.contains_key(email) {
                    return Err(AuthError::RegistrationFailed(Some("Email already exists".into())));
                }
                let n = state.next_id();
                let token = Credential::new(format!("tok-{n}"));
                state
                    .tokens
                    .insert(token.clone(), Identity::new(SubjectId(format!("u{n}")), false));
                state.accounts.insert(
                    email.to_owned(),
                    Account {
                        password: password.to_owned(),
                        token,
                    },
                );
                Ok(())
            },
        )
        .await
    }

    async fn fetch_current_user(&self, token: &Credential) -> Result<Identity, AuthError> {
        self.call(
            Operation::FetchCurrentUser,
            |f| f.into_auth(Operation::FetchCurrentUser),
            |state| state.tokens.get(token).cloned().ok_or(AuthError::Unauthorized),
        )
        .await
    }

    async fn list_entries(
        &self,
        token: Option<&Credential>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.call(
            Operation::List,
            |f| f.into_catalog(Operation::List),
            |state| {
                state.reader(token)?;
                Ok(state.entries.clone())
            },
        )
        .await
    }

    async fn get_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> Result<CatalogEntry, CatalogError> {
        self.call(
            Operation::Get,
            |f| f.into_catalog(Operation::Get),
            |state| {
                state.reader(token)?;
                state
                    .entries
                    .iter()
                    .find(|e| &e.id == id)
                    .cloned()
                    .ok_or_else(|| CatalogError::NotFound(id.clone()))
            },
        )
        .await
    }

    async fn create_entry(
        &self,
        token: Option<&Credential>,
        entry: &NewEntry,
    ) -> Result<CatalogEntry, CatalogError> {
        self.call(
            Operation::Create,
            |f| f.into_catalog(Operation::Create),
            |state| {
                state.writer(token, Operation::Create)?;
                let id = loop {
                    let id = EntryId(format!("m{}", state.next_id()));
                    if state.position(&id).is_none() {
                        break id;
                    }
                };
                let created = entry.clone().into_entry(id);
                state.entries.push(created.clone());
                Ok(created)
            },
        )
        .await
    }

    async fn update_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> Result<(), CatalogError> {
        self.call(
            Operation::Update,
            |f| f.into_catalog(Operation::Update),
            |state| {
                state.writer(token, Operation::Update)?;
                let index = state.position(id).ok_or_else(|| CatalogError::Rejected {
                    operation: "update",
                    detail: "Movie not found".into(),
                })?;
                state.entries[index].apply(patch);
                Ok(())
            },
        )
        .await
    }

    async fn delete_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> Result<(), CatalogError> {
        self.call(
            Operation::Delete,
            |f| f.into_catalog(Operation::Delete),
            |state| {
                state.writer(token, Operation::Delete)?;
                let index = state.position(id).ok_or_else(|| CatalogError::Rejected {
                    operation: "delete",
                    detail: "Movie not found".into(),
                })?;
                state.entries.remove(index);
                Ok(())
            },
        )
        .await
    }
}
