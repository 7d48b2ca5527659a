use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Server-assigned catalog entry identifier (wire field `_id`).
///
/// Immutable after creation; the only identity the reconciler keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Authenticated subject identifier (wire field `user._id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque bearer token.
///
/// The store never inspects its shape. `Debug` is redacted so a token
/// never ends up in a log line.
#[derive(Clone, PartialEq, Eq, Hash, From, Into)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header and persistence only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Identity returned by the current-user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub is_privileged: bool,
}

impl Identity {
    #[must_use]
    pub fn new(subject_id: impl Into<SubjectId>, is_privileged: bool) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_privileged,
        }
    }
}
