//! Session state machine.
//!
//! ```text
//! Unknown ──startup──▶ Anonymous ◀──logout / Unauthorized──┐
//!    │                     │                               │
//!    └──startup (token ok)─┴──login──▶ Authenticated ──────┘
//! ```
//!
//! [`SessionController`] is the only writer. Views hold a [`SessionView`],
//! a read-only handle onto the same state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::credential::CredentialStore;
use crate::error::{AuthError, RejectsCredential};
use crate::notify::{Notifier, messages};
use crate::service::CatalogService;
use crate::types::{Credential, Identity, SubjectId};

/// Observable session state.
///
/// `Unknown` exists only until startup completes and must never drive an
/// authorization decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unknown,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// `true` only for an authenticated, privileged subject.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.identity().is_some_and(|i| i.is_privileged)
    }

    /// The nullable `{subjectId, isPrivileged}` projection.
    #[must_use]
    pub fn session(&self) -> Session {
        match self {
            Self::Authenticated(identity) => Session {
                subject_id: Some(identity.subject_id.clone()),
                is_privileged: Some(identity.is_privileged),
            },
            Self::Unknown | Self::Anonymous => Session::default(),
        }
    }
}

/// Flat session record: `subject_id` is `None` iff unauthenticated, and
/// `is_privileged` is set iff `subject_id` is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub subject_id: Option<SubjectId>,
    pub is_privileged: Option<bool>,
}

/// Read-only handle onto the controller's state.
#[derive(Debug, Clone)]
pub struct SessionView {
    rx: watch::Receiver<SessionState>,
}

impl SessionView {
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Wait for the next transition. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until startup has resolved the state. `None` if the controller
    /// was dropped first.
    pub async fn settled(&mut self) -> Option<SessionState> {
        self.rx
            .wait_for(SessionState::is_known)
            .await
            .ok()
            .map(|state| state.clone())
    }
}

/// Owns the session: derives it from the stored credential, runs login and
/// logout, and invalidates on rejected credentials.
///
/// # Example
///
/// ```rust,ignore
/// let controller = SessionController::new(client, FileCredentialStore::new(dir), TracingNotifier);
/// controller.startup().await;
/// let view = controller.view();
/// let variant = resolve_view(&Route::Movies, &view.current());
/// ```
pub struct SessionController<C, S, N> {
    service: Arc<C>,
    store: S,
    notifier: N,
    token: Mutex<Option<Credential>>,
    state: watch::Sender<SessionState>,
}

impl<C, S, N> SessionController<C, S, N>
where
    C: CatalogService,
    S: CredentialStore,
    N: Notifier,
{
    #[must_use]
    pub fn new(service: Arc<C>, store: S, notifier: N) -> Self {
        Self {
            service,
            store,
            notifier,
            token: Mutex::new(None),
            state: watch::Sender::new(SessionState::Unknown),
        }
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            rx: self.state.subscribe(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Token of the live session, for attaching to catalog calls.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.token.lock().clone()
    }

    #[must_use]
    pub fn service(&self) -> &Arc<C> {
        &self.service
    }

    /// Derive the session from the stored credential.
    ///
    /// Without a stored token this goes straight to `Anonymous`: no remote
    /// call, no notification. A stored token that fails validation for any
    /// reason is cleared and reported once as an expired session.
    pub async fn startup(&self) -> SessionState {
        let stored = self.store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read stored credential");
            None
        });

        let Some(token) = stored else {
            tracing::debug!("No stored credential");
            self.transition(SessionState::Anonymous);
            return SessionState::Anonymous;
        };

        match self.service.fetch_current_user(&token).await {
            Ok(identity) => {
                tracing::info!(
                    subject = %identity.subject_id,
                    privileged = identity.is_privileged,
                    "Session restored"
                );
                *self.token.lock() = Some(token);
                self.transition(SessionState::Authenticated(identity))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential rejected");
                self.forget_credential();
                self.notifier.notify_error(messages::SESSION_EXPIRED);
                self.transition(SessionState::Anonymous)
            }
        }
    }

    /// Authenticate, persist the token, then resolve the identity behind it.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of whichever step failed. A failure after
    /// the token was issued clears it again and leaves the session
    /// `Anonymous`.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let token = match self.service.login(email, password).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.notifier.notify_error(messages::LOGIN_FAILED);
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&token) {
            tracing::warn!(
                error = %e,
                "Could not persist credential; session will not survive restart"
            );
        }

        match self.service.fetch_current_user(&token).await {
            Ok(identity) => {
                tracing::info!(
                    subject = %identity.subject_id,
                    privileged = identity.is_privileged,
                    "Login successful"
                );
                *self.token.lock() = Some(token);
                self.transition(SessionState::Authenticated(identity.clone()));
                self.notifier.notify_success(messages::LOGIN_SUCCEEDED);
                Ok(identity)
            }
            Err(e) => {
                tracing::error!(error = %e, "User details request failed after login");
                self.forget_credential();
                self.transition(SessionState::Anonymous);
                self.notifier.notify_error(messages::USER_DETAILS_FAILED);
                Err(e)
            }
        }
    }

    /// Create an account. Never changes the session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RegistrationFailed`] or [`AuthError::Network`].
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        match self.service.register(email, password).await {
            Ok(()) => {
                tracing::info!("Registration successful");
                self.notifier.notify_success(messages::REGISTERED);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                self.notifier.notify_error(messages::REGISTRATION_FAILED);
                Err(e)
            }
        }
    }

    /// Explicit logout. Silent.
    pub fn logout(&self) {
        self.forget_credential();
        self.transition(SessionState::Anonymous);
        tracing::info!("Logged out");
    }

    /// Treat the live session as expired: clear the credential, go
    /// `Anonymous`, and notify if a session was actually live.
    pub fn invalidate(&self) {
        let was_authenticated = matches!(*self.state.borrow(), SessionState::Authenticated(_));
        self.forget_credential();
        self.transition(SessionState::Anonymous);
        if was_authenticated {
            tracing::warn!("Session invalidated by rejected credential");
            self.notifier.notify_error(messages::SESSION_EXPIRED);
        }
    }

    /// Pass `result` through, invalidating the session first if its error
    /// means the credential was rejected.
    ///
    /// ```rust,ignore
    /// let entries = controller.guard(reconciler.load_all(token.as_ref()).await)?;
    /// ```
    pub fn guard<T, E: RejectsCredential>(&self, result: Result<T, E>) -> Result<T, E> {
        if let Err(e) = &result {
            if e.rejects_credential() {
                self.invalidate();
            }
        }
        result
    }

    fn forget_credential(&self) {
        self.token.lock().take();
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Could not clear stored credential");
        }
    }

    fn transition(&self, next: SessionState) -> SessionState {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Session transition");
        }
        next
    }
}
