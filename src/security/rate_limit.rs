use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_ms: u64,
}

/// Sliding-window attempt limiter keyed by an arbitrary string (remote IP
/// here). Attempts older than the window are forgotten on each call.
#[derive(Debug, Clone)]
pub struct AttemptLimiter {
    max_attempts: u32,
    window: Duration,
    state: Arc<RwLock<HashMap<String, Vec<u64>>>>,
}

impl AttemptLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record one attempt for `key` and report whether it fits the window.
    pub async fn try_acquire(&self, key: &str) -> RateLimitDecision {
        let now = now_unix_ms();
        let cutoff = now.saturating_sub(self.window.as_millis() as u64);

        let mut guard = self.state.write().await;
        let attempts = guard.entry(key.to_owned()).or_default();
        attempts.retain(|attempt| *attempt >= cutoff);

        if attempts.len() >= self.max_attempts as usize {
            let retry_after_ms = attempts
                .first()
                .map(|oldest| oldest.saturating_sub(cutoff))
                .unwrap_or(0);
            return RateLimitDecision {
                allowed: false,
                retry_after_ms,
            };
        }

        attempts.push(now);
        RateLimitDecision {
            allowed: true,
            retry_after_ms: 0,
        }
    }

    pub async fn reset(&self, key: &str) {
        self.state.write().await.remove(key);
    }
}

fn now_unix_ms() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(value) => u64::try_from(value.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
