//! Which paths are public, which are protected, and where redirects go.

use url::form_urlencoded;

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/";
/// Query parameter carrying the originally requested path.
pub const RESUME_PARAM: &str = "redirect";
/// Prefixes the gate never looks at: API routes and static assets.
pub const DEFAULT_EXCLUDED_PREFIXES: [&str; 5] = [
    "/api",
    "/_next/static",
    "/_next/image",
    "/favicon.ico",
    "/assets",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    /// Not gated at all.
    Excluded,
    Public,
    Protected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePolicy {
    login_path: String,
    landing_path: String,
    public_paths: Vec<String>,
    excluded_prefixes: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH, DEFAULT_LANDING_PATH)
    }
}

impl RoutePolicy {
    /// The login path is always public.
    #[must_use]
    pub fn new(login_path: &str, landing_path: &str) -> Self {
        Self {
            login_path: login_path.to_string(),
            landing_path: landing_path.to_string(),
            public_paths: vec![login_path.to_string()],
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn with_public_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.public_paths.contains(&path) {
                self.public_paths.push(path);
            }
        }
        self
    }

    #[must_use]
    pub fn with_excluded_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.excluded_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn public_paths(&self) -> &[String] {
        &self.public_paths
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            PathClass::Excluded
        } else if self.public_paths.iter().any(|public| public == path) {
            PathClass::Public
        } else {
            PathClass::Protected
        }
    }

    /// `/login?redirect=<encoded path>`.
    #[must_use]
    pub fn login_redirect(&self, requested: &str) -> String {
        let encoded: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(RESUME_PARAM, requested)
            .finish();
        format!("{}?{encoded}", self.login_path)
    }
}

/// `/api` matches `/api` and `/api/...` but not `/apiary`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'))
}
