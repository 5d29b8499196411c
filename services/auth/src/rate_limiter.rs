//! Per-key request limiter for sign-in link requests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per window
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    requests: u32,
}

/// Fixed-window limiter keyed by an arbitrary string, e.g. an email address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request for `key` and report whether it fits in the window.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        // Forget windows that have run out so the map stays bounded.
        windows.retain(|_, window| now.duration_since(window.started) < self.config.window);

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            requests: 0,
        });
        if window.requests >= self.config.max_requests {
            info!(key, "Rate limit reached");
            return false;
        }
        window.requests += 1;
        true
    }
}
