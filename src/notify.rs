use std::sync::Arc;

use parking_lot::Mutex;

/// User-facing notification texts.
pub mod messages {
    pub const LOGIN_SUCCEEDED: &str = "Login successful!";
    pub const LOGIN_FAILED: &str = "Login failed!";
    pub const USER_DETAILS_FAILED: &str = "Error fetching user details.";
    pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";
    pub const REGISTERED: &str = "Registration successful! Please login.";
    pub const REGISTRATION_FAILED: &str = "Registration failed.";

    pub const LOAD_FAILED: &str = "Error fetching movies.";
    pub const CREATED: &str = "Movie added successfully.";
    pub const CREATE_FAILED: &str = "Error adding movie";
    pub const UPDATED: &str = "Movie updated successfully.";
    pub const UPDATE_FAILED: &str = "Error updating movie";
    pub const DELETED: &str = "Movie deleted successfully.";
    pub const DELETE_FAILED: &str = "Error deleting movie";
}

/// Fire-and-forget user-visible signaling.
///
/// Delivery order relative to state updates is not guaranteed.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_error(&self, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify_success(&self, message: &str) {
        (**self).notify_success(message);
    }

    fn notify_error(&self, message: &str) {
        (**self).notify_error(message);
    }
}

/// Emits notifications as `tracing` events under the `notification` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(target: "notification", "{message}");
    }

    fn notify_error(&self, message: &str) {
        tracing::warn!(target: "notification", "{message}");
    }
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

impl Notification {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Error(m) => m,
        }
    }
}

/// Records notifications in order. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    /// How many notifications carried exactly `message`.
    #[must_use]
    pub fn count(&self, message: &str) -> usize {
        self.log.lock().iter().filter(|n| n.message() == message).count()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl Notifier for MemoryNotifier {
    fn notify_success(&self, message: &str) {
        self.log.lock().push(Notification::Success(message.to_owned()));
    }

    fn notify_error(&self, message: &str) {
        self.log.lock().push(Notification::Error(message.to_owned()));
    }
}
