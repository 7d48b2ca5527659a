use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ConfigError;

/// Production catalog service.
pub const DEFAULT_API_URL: &str = "https://movieapp-api-lms1.onrender.com";

const PROFILE_DIR_NAME: &str = "movieapp";

/// Where the remote catalog service lives.
///
/// ```rust
/// use movieapp_client::ClientConfig;
///
/// let config = ClientConfig::new("http://127.0.0.1:4000/api".parse()?)?;
/// assert_eq!(config.base_url().as_str(), "http://127.0.0.1:4000/api");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `base_url` is not an `http(s)` URL
    /// that endpoint paths can be appended to.
    pub fn new(base_url: Url) -> Result<Self, ConfigError> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                var: "base_url",
                reason: format!("expected an http(s) base URL, got {base_url}"),
            });
        }
        Ok(Self { base_url })
    }

    /// Read `MOVIEAPP_API_URL`, falling back to [`DEFAULT_API_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        match lookup("MOVIEAPP_API_URL") {
            Some(raw) => Self::new(parse_url("MOVIEAPP_API_URL", &raw)?),
            None => Ok(Self::default()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.parse().expect("valid default URL"),
        }
    }
}

/// Everything the `movieapp` front end needs: the service and the profile
/// directory holding the persisted credential.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub profile_dir: PathBuf,
}

impl AppConfig {
    #[must_use]
    pub fn new(client: ClientConfig, profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            profile_dir: profile_dir.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `MOVIEAPP_API_URL`: catalog service base URL (default [`DEFAULT_API_URL`])
    /// - `MOVIEAPP_PROFILE_DIR`: credential directory (default `<config dir>/movieapp`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is invalid or no profile
    /// directory can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok(), dirs::config_dir())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let client = ClientConfig::from_lookup(&lookup)?;
        let profile_dir = match lookup("MOVIEAPP_PROFILE_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            Some(_) => {
                return Err(ConfigError::Invalid {
                    var: "MOVIEAPP_PROFILE_DIR",
                    reason: "must not be empty".into(),
                });
            }
            None => config_dir
                .map(|d| d.join(PROFILE_DIR_NAME))
                .ok_or(ConfigError::NoProfileDir)?,
        };
        Ok(Self::new(client, profile_dir))
    }

    #[must_use]
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    raw.trim().parse().map_err(|e: url::ParseError| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
