//! Cookie capability probe
//!
//! Decides per request whether cookie credentials will actually be sent to
//! the backend. Some clients silently drop cross-site cookies; in that case
//! the request wrapper falls back to bearer tokens from the token store.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

const TEST_COOKIE_NAME: &str = "cookie_test";

/// Answers whether cookie-based auth is usable right now
#[cfg_attr(test, mockall::automock)]
pub trait CookieProbe: Send + Sync {
    fn cookies_usable(&self) -> bool;
}

/// Probe that writes a `SameSite=None; Secure` test cookie into the shared
/// jar and checks that it reads back for the API origin
///
/// The test cookie is expired again before returning, so the jar is left as
/// it was found. Plain-HTTP origins never read back a `Secure` cookie and
/// therefore report `false`.
pub struct JarCookieProbe {
    jar: Arc<Jar>,
    url: Url,
}

impl JarCookieProbe {
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }
}

impl CookieProbe for JarCookieProbe {
    fn cookies_usable(&self) -> bool {
        self.jar.add_cookie_str(
            &format!("{}=1; Path=/; SameSite=None; Secure", TEST_COOKIE_NAME),
            &self.url,
        );

        let supported = header_has_cookie(self.jar.as_ref(), &self.url, TEST_COOKIE_NAME);

        self.jar.add_cookie_str(
            &format!("{}=1; Max-Age=0; Path=/; SameSite=None; Secure", TEST_COOKIE_NAME),
            &self.url,
        );

        tracing::trace!("Cookie probe for {}: {}", self.url.origin().ascii_serialization(), supported);
        supported
    }
}

/// Probe with a fixed answer
///
/// Used when cookies are disabled in config, and by deployments that know
/// their cookie policy up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedCookieProbe(pub bool);

impl CookieProbe for FixedCookieProbe {
    fn cookies_usable(&self) -> bool {
        self.0
    }
}

/// Returns true if the jar would send a cookie called `name` to `url`
pub(crate) fn header_has_cookie(jar: &Jar, url: &Url, name: &str) -> bool {
    jar.cookies(url)
        .and_then(|value| {
            value.to_str().ok().map(|header| {
                header
                    .split(';')
                    .filter_map(|pair| pair.trim().split_once('='))
                    .any(|(key, _)| key == name)
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_probe() {
        assert!(FixedCookieProbe(true).cookies_usable());
        assert!(!FixedCookieProbe(false).cookies_usable());
    }

    #[test]
    fn test_jar_probe_https_origin() {
        let jar = Arc::new(Jar::default());
        let url = Url::parse("https://api.example.com/").unwrap();
        let probe = JarCookieProbe::new(jar.clone(), url.clone());

        assert!(probe.cookies_usable());
        // test cookie does not linger
        assert!(!header_has_cookie(&jar, &url, TEST_COOKIE_NAME));
    }

    #[test]
    fn test_jar_probe_plain_http_origin() {
        let jar = Arc::new(Jar::default());
        let url = Url::parse("http://api.example.com/").unwrap();
        let probe = JarCookieProbe::new(jar, url);

        assert!(!probe.cookies_usable());
    }

    #[test]
    fn test_jar_probe_keeps_other_cookies() {
        let jar = Arc::new(Jar::default());
        let url = Url::parse("https://api.example.com/").unwrap();
        jar.add_cookie_str("refreshToken=r1; Path=/", &url);

        let probe = JarCookieProbe::new(jar.clone(), url.clone());
        assert!(probe.cookies_usable());
        assert!(header_has_cookie(&jar, &url, "refreshToken"));
    }

    #[test]
    fn test_header_has_cookie_exact_name() {
        let jar = Jar::default();
        let url = Url::parse("https://api.example.com/").unwrap();
        jar.add_cookie_str("refreshTokenOld=x; Path=/", &url);

        assert!(!header_has_cookie(&jar, &url, "refreshToken"));
        assert!(header_has_cookie(&jar, &url, "refreshTokenOld"));
    }
}
