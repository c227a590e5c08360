//! Endpoint-to-address resolution.
//!
//! Callers name an endpoint path such as `/notifications`; where that path lives depends
//! on the deployment platform. On an Android emulator the development host is reachable
//! at `10.0.2.2`, everywhere else at `localhost`.

const ANDROID_WS_BASE_URL: &str = "ws://10.0.2.2:8080";
const LOCAL_WS_BASE_URL: &str = "ws://localhost:8080";
const ANDROID_HTTP_BASE_URL: &str = "http://10.0.2.2:8080";
const LOCAL_HTTP_BASE_URL: &str = "http://localhost:8080";

/// Builds a full connection address from an endpoint path.
pub trait ResolveAddress {
    fn resolve(&self, endpoint: &str) -> String;
}

impl<F: Fn(&str) -> String> ResolveAddress for F {
    fn resolve(&self, endpoint: &str) -> String {
        self(endpoint)
    }
}

/// Deployment platform, which determines the base URL of the backend.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Other,
}

impl Platform {
    /// The platform this crate was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn ws_base_url(self) -> &'static str {
        match self {
            Self::Android => ANDROID_WS_BASE_URL,
            Self::Ios | Self::Other => LOCAL_WS_BASE_URL,
        }
    }

    #[must_use]
    pub const fn http_base_url(self) -> &'static str {
        match self {
            Self::Android => ANDROID_HTTP_BASE_URL,
            Self::Ios | Self::Other => LOCAL_HTTP_BASE_URL,
        }
    }
}

impl ResolveAddress for Platform {
    fn resolve(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.ws_base_url())
    }
}

/// Resolves endpoints against an explicit base such as `ws://127.0.0.1:9001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    base: String,
}

impl BaseUrl {
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.base
    }
}

impl ResolveAddress for BaseUrl {
    fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') || endpoint.is_empty() {
            format!("{}{endpoint}", self.base)
        } else {
            format!("{}/{endpoint}", self.base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ios_resolves_to_localhost() {
        assert_eq!(
            Platform::Ios.resolve("/notifications"),
            "ws://localhost:8080/notifications"
        );
    }

    #[test]
    fn android_resolves_to_emulator_host() {
        assert_eq!(
            Platform::Android.resolve("/notifications"),
            "ws://10.0.2.2:8080/notifications"
        );
        assert_eq!(Platform::Android.http_base_url(), "http://10.0.2.2:8080");
    }

    #[test]
    fn base_url_joins_with_single_slash() {
        let base = BaseUrl::new("ws://127.0.0.1:9001/");

        assert_eq!(base.resolve("/notifications"), "ws://127.0.0.1:9001/notifications");
        assert_eq!(base.resolve("notifications"), "ws://127.0.0.1:9001/notifications");
    }

    #[test]
    fn closures_resolve_addresses() {
        let resolver = |endpoint: &str| format!("wss://example.com{endpoint}");

        assert_eq!(resolver.resolve("/feed"), "wss://example.com/feed");
    }
}
