/// Request rate limiting for the credential endpoints
///
/// Fixed window per client key (peer IP): at most `max_requests` in each
/// `window`, counted from the first request of the window. A rejected
/// request does not touch the counter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::configuration::RateLimitSettings;
use crate::error::AppError;

// Stale windows are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests,
            window: Duration::from_secs(settings.window_seconds),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `client`
    ///
    /// # Errors
    /// `RateLimited` once the window's budget is spent
    pub fn check(&self, client: &str) -> Result<(), AppError> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), AppError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| AppError::Internal("rate limiter lock poisoned".to_string()))?;

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            tracing::warn!(client = %client, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        entry.count += 1;
        Ok(())
    }
}
