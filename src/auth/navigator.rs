//! Redirect side effects
//!
//! When auth cannot be recovered the client sends the user to the login
//! page. Where that lands depends on the host: a desktop client opens the
//! storefront in the browser, tests record the redirect.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Sends the user to a storefront path such as `/login`
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Opens storefront pages in the default browser
pub struct BrowserNavigator {
    frontend_url: String,
}

impl BrowserNavigator {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
        }
    }

    /// Full URL for a storefront path
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.frontend_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Navigator for BrowserNavigator {
    fn redirect(&self, path: &str) {
        let url = self.url_for(path);
        tracing::info!("Redirecting to {}", url);
        if let Err(e) = opener::open(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }
}

/// A redirect captured by [`RecordingNavigator`]
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub path: String,
    pub at: DateTime<Utc>,
}

/// Keeps every redirect in memory instead of acting on it
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<Redirect>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All redirects so far, oldest first
    pub fn redirects(&self) -> Vec<Redirect> {
        self.redirects
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Path of the most recent redirect
    pub fn last_path(&self) -> Option<String> {
        self.redirects().pop().map(|r| r.path)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        tracing::debug!("Recorded redirect to {}", path);
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(Redirect {
                path: path.to_string(),
                at: Utc::now(),
            });
        }
    }
}
