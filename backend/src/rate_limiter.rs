use std::collections::HashMap;
use std::sync::Mutex;
use time::{OffsetDateTime, Duration};
use tracing::{warn, error};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Too many vote requests. Please try again in {retry_in_minutes} minute(s).")]
pub struct RateLimited {
    pub retry_in_minutes: i64,
}

#[derive(Debug)]
struct Window {
    attempts: u32,
    opened_at: OffsetDateTime,
}

/// Fixed-window attempt counter keyed by an arbitrary string, used to
/// throttle vote writes per voter key.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_attempts: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_minutes: i64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::minutes(window_minutes),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), RateLimited> {
        self.check_at(key, OffsetDateTime::now_utc())
    }

    pub(crate) fn check_at(&self, key: &str, now: OffsetDateTime) -> Result<(), RateLimited> {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(e) => {
                // A poisoned limiter must not block voting.
                error!("Failed to acquire rate limit lock: {}", e);
                return Ok(());
            }
        };

        windows.retain(|_, window| now - window.opened_at <= self.window * 2);

        let window = windows.entry(key.to_string()).or_insert(Window { attempts: 0, opened_at: now });
        if now - window.opened_at > self.window {
            *window = Window { attempts: 0, opened_at: now };
        }

        if window.attempts >= self.max_attempts {
            let retry_in_minutes = (window.opened_at + self.window - now).whole_minutes().max(1);
            warn!(attempts = window.attempts, "Vote rate limit triggered");
            return Err(RateLimited { retry_in_minutes });
        }

        window.attempts += 1;
        Ok(())
    }
}
