//! Page routes, the sign-in guard and sidebar navigation.

use std::fmt;

use serde::Serialize;

pub const AUTH_PATH: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "page", content = "id", rename_all = "kebab-case")]
pub enum Route {
    Dashboard,
    Leads,
    Campaigns,
    CampaignDetail(String),
    Messages,
    LinkedInAccounts,
    Settings,
    Auth,
    NotFound,
}

impl Route {
    /// Match a location path. Query strings, fragments and a trailing slash
    /// are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .split('/')
            .skip_while(|s| s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Dashboard,
            ["leads"] => Route::Leads,
            ["campaigns"] => Route::Campaigns,
            ["campaigns", id] if !id.is_empty() => Route::CampaignDetail((*id).to_string()),
            ["messages"] => Route::Messages,
            ["linkedin-accounts"] => Route::LinkedInAccounts,
            ["settings"] => Route::Settings,
            ["auth"] => Route::Auth,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Dashboard => "/".to_string(),
            Route::Leads => "/leads".to_string(),
            Route::Campaigns => "/campaigns".to_string(),
            Route::CampaignDetail(id) => format!("/campaigns/{}", id),
            Route::Messages => "/messages".to_string(),
            Route::LinkedInAccounts => "/linkedin-accounts".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::Auth => AUTH_PATH.to_string(),
            Route::NotFound => "*".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Dashboard => "Dashboard",
            Route::Leads => "Leads",
            Route::Campaigns => "Campaigns",
            Route::CampaignDetail(_) => "Campaign Details",
            Route::Messages => "Messages",
            Route::LinkedInAccounts => "LinkedIn Accounts",
            Route::Settings => "Settings",
            Route::Auth => "Sign In",
            Route::NotFound => "Page Not Found",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Auth | Route::NotFound)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Resolution {
    Render(Route),
    Redirect(String),
}

/// Apply the sign-in guard. Protected pages redirect to the auth page when
/// nobody is signed in.
pub fn resolve(route: Route, authenticated: bool) -> Resolution {
    if route.requires_auth() && !authenticated {
        log::debug!("Redirecting unauthenticated visit to {}", route);
        return Resolution::Redirect(AUTH_PATH.to_string());
    }
    Resolution::Render(route)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub title: &'static str,
    pub url: &'static str,
}

pub const NAV_ITEMS: [NavItem; 6] = [
    NavItem { title: "Dashboard", url: "/" },
    NavItem { title: "Leads", url: "/leads" },
    NavItem { title: "Campaigns", url: "/campaigns" },
    NavItem { title: "Messages", url: "/messages" },
    NavItem { title: "LinkedIn Accounts", url: "/linkedin-accounts" },
    NavItem { title: "Settings", url: "/settings" },
];

/// Sidebar highlight: exact path match only, so `/campaigns/42` lights
/// nothing.
pub fn is_active(current_path: &str, url: &str) -> bool {
    current_path == url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_paths() {
        assert_eq!(Route::parse("/"), Route::Dashboard);
        assert_eq!(Route::parse(""), Route::Dashboard);
        assert_eq!(Route::parse("/leads"), Route::Leads);
        assert_eq!(Route::parse("/leads/"), Route::Leads);
        assert_eq!(Route::parse("/campaigns?status=active"), Route::Campaigns);
        assert_eq!(
            Route::parse("/campaigns/abc-123"),
            Route::CampaignDetail("abc-123".into())
        );
        assert_eq!(Route::parse("/linkedin-accounts"), Route::LinkedInAccounts);
        assert_eq!(Route::parse("/auth"), Route::Auth);
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/nope"), Route::NotFound);
        assert_eq!(Route::parse("/campaigns/1/leads"), Route::NotFound);
        assert_eq!(Route::parse("/LEADS"), Route::NotFound);
    }

    #[test]
    fn paths_round_trip_through_parse() {
        for item in NAV_ITEMS {
            assert_eq!(Route::parse(item.url).path(), item.url);
        }
    }

    #[test]
    fn guard_redirects_when_signed_out() {
        assert_eq!(
            resolve(Route::Leads, false),
            Resolution::Redirect("/auth".into())
        );
        assert_eq!(
            resolve(Route::Dashboard, false),
            Resolution::Redirect("/auth".into())
        );
        assert_eq!(resolve(Route::Leads, true), Resolution::Render(Route::Leads));
        assert_eq!(resolve(Route::Auth, false), Resolution::Render(Route::Auth));
        assert_eq!(
            resolve(Route::NotFound, false),
            Resolution::Render(Route::NotFound)
        );
    }

    #[test]
    fn nav_highlight_is_exact() {
        assert!(is_active("/campaigns", "/campaigns"));
        assert!(!is_active("/campaigns/42", "/campaigns"));
        assert!(!is_active("/leads", "/"));
    }
}
