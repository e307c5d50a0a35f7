//! Views and the authentication guard in front of them

use std::fmt;

/// A client view, addressed by a `#/name` fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Auth,
    Home,
    Chat,
    Recognition,
    Points,
    Profile,
    Settings,
    About,
}

impl Route {
    /// Parse a location fragment such as `#/chat`; unknown paths land on home
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Self {
        let path = fragment.trim_start_matches('#').trim_start_matches('/');
        let path = path.split(['?', '/']).next().unwrap_or_default();
        match path {
            "auth" => Self::Auth,
            "chat" => Self::Chat,
            "recognition" => Self::Recognition,
            "points" => Self::Points,
            "profile" => Self::Profile,
            "settings" => Self::Settings,
            "about" => Self::About,
            _ => Self::Home,
        }
    }

    /// Fragment form of the route
    #[must_use]
    pub const fn fragment(self) -> &'static str {
        match self {
            Self::Auth => "#/auth",
            Self::Home => "#/",
            Self::Chat => "#/chat",
            Self::Recognition => "#/recognition",
            Self::Points => "#/points",
            Self::Profile => "#/profile",
            Self::Settings => "#/settings",
            Self::About => "#/about",
        }
    }

    /// Whether the view needs a session
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        !matches!(self, Self::Auth | Self::Settings | Self::About)
    }

    /// Where a request for this route actually goes
    ///
    /// Signed-out users are sent to the auth view; signed-in users never see it.
    #[must_use]
    pub const fn guard(self, authenticated: bool) -> Self {
        match (self, authenticated) {
            (Self::Auth, true) => Self::Home,
            (route, false) if route.requires_auth() => Self::Auth,
            (route, _) => route,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fragment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fragment() {
        assert_eq!(Route::from_fragment(""), Route::Home);
        assert_eq!(Route::from_fragment("#/"), Route::Home);
        assert_eq!(Route::from_fragment("#/chat"), Route::Chat);
        assert_eq!(Route::from_fragment("#points"), Route::Points);
        assert_eq!(Route::from_fragment("#/profile/edit"), Route::Profile);
        assert_eq!(Route::from_fragment("#/nowhere"), Route::Home);
    }

    #[test]
    fn test_guard_redirects() {
        assert_eq!(Route::Chat.guard(false), Route::Auth);
        assert_eq!(Route::Home.guard(false), Route::Auth);
        assert_eq!(Route::Auth.guard(true), Route::Home);
        assert_eq!(Route::Auth.guard(false), Route::Auth);
        assert_eq!(Route::Points.guard(true), Route::Points);
        assert_eq!(Route::Settings.guard(false), Route::Settings);
    }

    #[test]
    fn test_fragment_round_trip() {
        for route in [Route::Auth, Route::Chat, Route::Recognition, Route::About] {
            assert_eq!(Route::from_fragment(route.fragment()), route);
        }
    }
}
