//! HTTP implementation of [`CatalogService`].

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::ClientConfig;
use crate::entry::{CatalogEntry, EntryPatch, NewEntry};
use crate::error::{AuthError, CatalogError};
use crate::service::CatalogService;
use crate::types::{Credential, EntryId, Identity, SubjectId};

/// `message` the service sends back on successful registration.
const REGISTERED: &str = "Registered Successfully";

/// Catalog service client over `reqwest`.
///
/// Stateless apart from the connection pool; cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    config: ClientConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct EmailPassword<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access: Option<String>,
}

#[derive(Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    user: Option<UserDetails>,
}

#[derive(Deserialize)]
struct UserDetails {
    #[serde(rename = "_id")]
    id: SubjectId,
    #[serde(rename = "isAdmin", default)]
    is_admin: bool,
}

/// `getMovie` answers with the fields only; `_id` is optional.
#[derive(Deserialize)]
struct MovieDetails {
    #[serde(rename = "_id", default)]
    id: Option<EntryId>,
    title: String,
    director: String,
    year: i32,
    genre: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct MutationResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    movie: Option<CatalogEntry>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl MutationResponse {
    fn detail(self) -> String {
        self.error
            .or(self.message)
            .unwrap_or_else(|| "service reported failure".into())
    }
}

impl CatalogClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorized(builder: RequestBuilder, token: Option<&Credential>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Maps non-success statuses of catalog calls; returns the response otherwise.
    ///
    /// Only 401 means the token itself was refused. A 403 is a valid token
    /// without the privilege, reported as `Rejected`.
    async fn check_catalog(
        response: Response,
        operation: &'static str,
    ) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(operation, "Catalog credential rejected");
            return Err(CatalogError::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<MutationResponse>(&body)
            .ok()
            .and_then(|r| r.error.or(r.message))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        tracing::warn!(
            operation,
            status = status.as_u16(),
            detail = %detail,
            "Catalog request failed"
        );
        Err(CatalogError::Rejected { operation, detail })
    }

    /// Decodes a `{success, ...}` body and turns `success: false` into `Rejected`.
    async fn confirmed(
        response: Response,
        operation: &'static str,
    ) -> Result<MutationResponse, CatalogError> {
        let response = Self::check_catalog(response, operation).await?;
        let body: MutationResponse = response.json().await?;
        if body.success {
            Ok(body)
        } else {
            let detail = body.detail();
            tracing::warn!(operation, detail = %detail, "Catalog mutation rejected");
            Err(CatalogError::Rejected { operation, detail })
        }
    }
}

impl CatalogService for CatalogClient {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        tracing::debug!("Requesting login");
        let response = self
            .http
            .post(self.config.endpoint(&["users", "login"]))
            .json(&EmailPassword { email, password })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!("login: HTTP {}", status.as_u16())));
        }

        let body: LoginResponse = response.json().await?;
        body.access
            .filter(|token| !token.is_empty())
            .map(Credential::new)
            .ok_or_else(|| {
                AuthError::UnexpectedResponse("login response has no `access` field".into())
            })
    }

    async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        tracing::debug!("Requesting registration");
        let response = self
            .http
            .post(self.config.endpoint(&["users", "register"]))
            .json(&EmailPassword { email, password })
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::Network(format!("register: HTTP {}", status.as_u16())));
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str::<RegisterResponse>(&body).ok();
        match parsed {
            Some(r) if status.is_success() && r.message.as_deref() == Some(REGISTERED) => Ok(()),
            Some(r) => Err(AuthError::RegistrationFailed(r.error.or(r.message))),
            None => Err(AuthError::RegistrationFailed(None)),
        }
    }

    async fn fetch_current_user(&self, token: &Credential) -> Result<Identity, AuthError> {
        tracing::debug!("Requesting current user");
        let response = self
            .http
            .get(self.config.endpoint(&["users", "details"]))
            .bearer_auth(token.expose())
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AuthError::Unauthorized);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!("user details: HTTP {}", status.as_u16())));
        }

        let body: DetailsResponse = response.json().await?;
        let user = body.user.ok_or(AuthError::Unauthorized)?;
        Ok(Identity {
            subject_id: user.id,
            is_privileged: user.is_admin,
        })
    }

    async fn list_entries(
        &self,
        token: Option<&Credential>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        tracing::debug!(operation = "list", "Requesting catalog");
        let request = self.http.get(self.config.endpoint(&["movies", "getMovies"]));
        let response = Self::authorized(request, token).send().await?;
        let response = Self::check_catalog(response, "list").await?;

        let mut body: JsonValue = response.json().await?;
        match body.get_mut("movies").map(JsonValue::take) {
            Some(movies @ JsonValue::Array(_)) => serde_json::from_value(movies)
                .map_err(|e| CatalogError::UnexpectedFormat(format!("movies: {e}"))),
            Some(_) => Err(CatalogError::UnexpectedFormat("`movies` is not a list".into())),
            None => Err(CatalogError::UnexpectedFormat("missing `movies` field".into())),
        }
    }

    async fn get_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> Result<CatalogEntry, CatalogError> {
        tracing::debug!(operation = "get", id = %id, "Requesting catalog entry");
        let request = self
            .http
            .get(self.config.endpoint(&["movies", "getMovie", id.as_str()]));
        let response = Self::authorized(request, token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.clone()));
        }
        let response = Self::check_catalog(response, "get").await?;

        let details: MovieDetails = response.json().await?;
        Ok(CatalogEntry {
            id: details.id.unwrap_or_else(|| id.clone()),
            title: details.title,
            director: details.director,
            year: details.year,
            genre: details.genre,
            description: details.description,
        })
    }

    async fn create_entry(
        &self,
        token: Option<&Credential>,
        entry: &NewEntry,
    ) -> Result<CatalogEntry, CatalogError> {
        tracing::debug!(operation = "create", title = entry.title(), "Requesting entry creation");
        let request = self
            .http
            .post(self.config.endpoint(&["movies", "addMovie"]))
            .json(entry);
        let response = Self::authorized(request, token).send().await?;

        Self::confirmed(response, "create")
            .await?
            .movie
            .ok_or_else(|| CatalogError::UnexpectedFormat("create response has no `movie`".into()))
    }

    async fn update_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> Result<(), CatalogError> {
        tracing::debug!(operation = "update", id = %id, "Requesting entry update");
        let request = self
            .http
            .put(self.config.endpoint(&["movies", "updateMovie", id.as_str()]))
            .json(patch);
        let response = Self::authorized(request, token).send().await?;
        Self::confirmed(response, "update").await.map(drop)
    }

    async fn delete_entry(
        &self,
        token: Option<&Credential>,
        id: &EntryId,
    ) -> Result<(), CatalogError> {
        tracing::debug!(operation = "delete", id = %id, "Requesting entry deletion");
        let request = self
            .http
            .delete(self.config.endpoint(&["movies", "deleteMovie", id.as_str()]));
        let response = Self::authorized(request, token).send().await?;
        Self::confirmed(response, "delete").await.map(drop)
    }
}
