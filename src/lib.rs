#![doc = include_str!("../README.md")]

#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod credential;
pub mod entry;
pub mod error;
pub mod gate;
pub mod notify;
pub mod reconciler;
pub mod service;
pub mod session;
pub mod testing;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use client::CatalogClient;
pub use config::{AppConfig, ClientConfig, DEFAULT_API_URL};
pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use entry::{CatalogEntry, EntryPatch, NewEntry};
pub use error::{
    AuthError, CatalogError, ConfigError, Error, RejectsCredential, StoreError, ValidationError,
};
pub use gate::{Route, ViewVariant, resolve_view};
pub use notify::{MemoryNotifier, Notification, Notifier, TracingNotifier};
pub use reconciler::{CatalogCache, CatalogReconciler, DeleteFailure, LoadStatus, PendingDeletion};
pub use service::CatalogService;
pub use session::{Session, SessionController, SessionState, SessionView};
pub use types::{Credential, EntryId, Identity, SubjectId};
