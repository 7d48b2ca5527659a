//! Route → view decision.
//!
//! `/movies` is the only gated route. `/admin` renders the dashboard for
//! every session; mutations issued from it are still checked by the service.

use std::fmt;

use crate::session::SessionState;
use crate::types::EntryId;

/// Navigable routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Movies,
    Admin,
    MovieDetails(EntryId),
    NotFound(String),
}

impl Route {
    /// Parse a path such as `/movies/66f1c0ffee`. A trailing slash is
    /// tolerated; entry ids are percent-decoded.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let normalized = trimmed.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(trimmed);
        let mut segments = normalized.strip_prefix('/').unwrap_or(normalized).split('/');

        let route = match (segments.next(), segments.next(), segments.next()) {
            (Some("login"), None, None) => Some(Self::Login),
            (Some("register"), None, None) => Some(Self::Register),
            (Some("movies"), None, None) => Some(Self::Movies),
            (Some("admin"), None, None) => Some(Self::Admin),
            (Some("movies"), Some(id), None) if !id.is_empty() => urlencoding::decode(id)
                .ok()
                .map(|id| Self::MovieDetails(EntryId(id.into_owned()))),
            _ => None,
        };
        route.unwrap_or_else(|| Self::NotFound(path.to_owned()))
    }

    /// Canonical path of this route.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".into(),
            Self::Register => "/register".into(),
            Self::Movies => "/movies".into(),
            Self::Admin => "/admin".into(),
            Self::MovieDetails(id) => format!("/movies/{}", urlencoding::encode(id.as_str())),
            Self::NotFound(path) => path.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl std::str::FromStr for Route {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// What a route renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewVariant {
    /// Session not yet resolved; render nothing.
    Loading,
    LoginView,
    RegisterView,
    StandardView,
    AdminView,
    DetailsView(EntryId),
    NotFoundView,
}

/// Decide which view `route` renders for `session`.
///
/// Pure and cheap: call it on every render.
#[must_use]
pub fn resolve_view(route: &Route, session: &SessionState) -> ViewVariant {
    match route {
        Route::Movies => match session {
            SessionState::Unknown => ViewVariant::Loading,
            state if state.is_privileged() => ViewVariant::AdminView,
            _ => ViewVariant::StandardView,
        },
        // TODO: require privilege here; anonymous sessions can open the dashboard
        Route::Admin => ViewVariant::AdminView,
        Route::Login => ViewVariant::LoginView,
        Route::Register => ViewVariant::RegisterView,
        Route::MovieDetails(id) => ViewVariant::DetailsView(id.clone()),
        Route::NotFound(_) => ViewVariant::NotFoundView,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    fn admin() -> SessionState {
        SessionState::Authenticated(Identity::new("u1", true))
    }

    fn member() -> SessionState {
        SessionState::Authenticated(Identity::new("u9", false))
    }

    #[test]
    fn parses_known_routes() {
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/register/"), Route::Register);
        assert_eq!(Route::parse("/movies"), Route::Movies);
        assert_eq!(Route::parse("movies"), Route::Movies);
        assert_eq!(Route::parse("/admin"), Route::Admin);
        assert_eq!(
            Route::parse("/movies/66f1c0ffee"),
            Route::MovieDetails(EntryId::from("66f1c0ffee"))
        );
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/"), Route::NotFound("/".into()));
        assert_eq!(Route::parse("/movies/a/b"), Route::NotFound("/movies/a/b".into()));
        assert_eq!(Route::parse("/movies//"), Route::NotFound("/movies//".into()));
        assert_eq!(Route::parse("/profile"), Route::NotFound("/profile".into()));
    }

    #[test]
    fn details_path_round_trips_encoded_ids() {
        let route = Route::MovieDetails(EntryId::from("a b"));
        assert_eq!(route.path(), "/movies/a%20b");
        assert_eq!(Route::parse(&route.path()), route);
    }

    #[test]
    fn movies_route_switches_on_privilege() {
        assert_eq!(resolve_view(&Route::Movies, &admin()), ViewVariant::AdminView);
        assert_eq!(resolve_view(&Route::Movies, &member()), ViewVariant::StandardView);
        assert_eq!(
            resolve_view(&Route::Movies, &SessionState::Anonymous),
            ViewVariant::StandardView
        );
    }

    #[test]
    fn unknown_session_never_decides_the_gated_route() {
        assert_eq!(
            resolve_view(&Route::Movies, &SessionState::Unknown),
            ViewVariant::Loading
        );
    }

    #[test]
    fn admin_route_is_ungated() {
        for state in [SessionState::Unknown, SessionState::Anonymous, member(), admin()] {
            assert_eq!(resolve_view(&Route::Admin, &state), ViewVariant::AdminView);
        }
    }

    #[test]
    fn other_routes_are_unconditional() {
        for state in [SessionState::Unknown, SessionState::Anonymous, admin()] {
            assert_eq!(resolve_view(&Route::Login, &state), ViewVariant::LoginView);
            assert_eq!(resolve_view(&Route::Register, &state), ViewVariant::RegisterView);
            assert_eq!(
                resolve_view(&Route::MovieDetails(EntryId::from("m1")), &state),
                ViewVariant::DetailsView(EntryId::from("m1"))
            );
        }
    }
}
