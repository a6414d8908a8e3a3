//! Fixed-window request rate limiting.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Window for per-minute limits.
pub const MINUTE_WINDOW_MS: i64 = 60_000;

/// Window for per-day limits.
pub const DAY_WINDOW_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy)]
struct RateBucket {
    count: u32,
    reset_at: i64,
}

/// Counts requests per key in fixed windows.
///
/// A window opens on the first request for a key and lasts `window_ms`.
/// Buckets are replaced when their window has passed, never swept.
#[derive(Debug, Default)]
pub struct FixedWindowRateLimiter {
    buckets: Mutex<HashMap<String, RateBucket>>,
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key` at `now` (Unix ms). Returns whether it is
    /// allowed. A `limit` of 0 disables the limit.
    pub fn consume(&self, key: &str, limit: u32, window_ms: i64, now: i64) -> bool {
        if limit == 0 {
            return true;
        }

        // Counters stay usable even if a holder panicked.
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        match buckets.get_mut(key) {
            Some(bucket) if now < bucket.reset_at => {
                if bucket.count >= limit {
                    return false;
                }
                bucket.count += 1;
                true
            }
            _ => {
                buckets.insert(
                    key.to_string(),
                    RateBucket {
                        count: 1,
                        reset_at: now.saturating_add(window_ms),
                    },
                );
                true
            }
        }
    }

    /// Forget every bucket.
    pub fn reset(&self) {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Derive the caller identity used in rate-limit keys from request headers.
///
/// `header` looks up a header value by lowercase name. Checks
/// `cf-connecting-ip`, then the first `x-forwarded-for` entry, then
/// `x-real-ip`.
pub fn rate_limit_subject<F>(header: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ip) = header("cf-connecting-ip").filter(|v| !v.is_empty()) {
        return ip;
    }

    if let Some(forwarded) = header("x-forwarded-for").filter(|v| !v.is_empty()) {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        return if first.is_empty() {
            "unknown".to_string()
        } else {
            first.to_string()
        };
    }

    match header("x-real-ip") {
        Some(ip) if !ip.trim().is_empty() => ip.trim().to_string(),
        _ => "unknown".to_string(),
    }
}
