//! Runtime configuration for the share service.

/// Deployment knobs for share creation and reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareConfig {
    /// Reject all share creation.
    pub disable_share_create: bool,
    /// Maximum UTF-8 size of a plaintext document.
    pub max_plaintext_bytes: usize,
    /// Lifetime of a share.
    pub share_ttl_seconds: u64,
    /// Key candidates tried before giving up.
    pub max_key_generation_attempts: u32,
    /// Per-subject creates per minute.
    pub rate_limit_create_per_min: u32,
    /// Per-subject creates per day.
    pub rate_limit_create_per_day: u32,
    /// Per-subject unlocks per minute.
    pub rate_limit_read_per_min: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            disable_share_create: false,
            max_plaintext_bytes: 32_768,
            share_ttl_seconds: 2_592_000,
            max_key_generation_attempts: 5,
            rate_limit_create_per_min: 10,
            rate_limit_create_per_day: 200,
            rate_limit_read_per_min: 60,
        }
    }
}

impl ShareConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Unset, unparsable or non-positive numbers keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            disable_share_create: parse_flag(lookup("DISABLE_SHARE_CREATE")),
            max_plaintext_bytes: positive(
                lookup("MAX_PLAINTEXT_BYTES"),
                defaults.max_plaintext_bytes,
            ),
            share_ttl_seconds: positive(lookup("SHARE_TTL_SECONDS"), defaults.share_ttl_seconds),
            max_key_generation_attempts: positive(
                lookup("MAX_KEY_GENERATION_ATTEMPTS"),
                defaults.max_key_generation_attempts,
            ),
            rate_limit_create_per_min: positive(
                lookup("RATE_LIMIT_CREATE_PER_MIN"),
                defaults.rate_limit_create_per_min,
            ),
            rate_limit_create_per_day: positive(
                lookup("RATE_LIMIT_CREATE_PER_DAY"),
                defaults.rate_limit_create_per_day,
            ),
            rate_limit_read_per_min: positive(
                lookup("RATE_LIMIT_READ_PER_MIN"),
                defaults.rate_limit_read_per_min,
            ),
        }
    }
}

fn parse_flag(value: Option<String>) -> bool {
    match value {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => false,
    }
}

fn positive<T>(value: Option<String>, fallback: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|n| *n > T::default())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ShareConfig::from_lookup(|_| None);
        assert_eq!(config, ShareConfig::default());
        assert_eq!(config.share_ttl_seconds, 30 * 24 * 60 * 60);
    }

    #[test]
    fn test_overrides() {
        let config = ShareConfig::from_lookup(lookup_from(&[
            ("DISABLE_SHARE_CREATE", "TRUE"),
            ("MAX_PLAINTEXT_BYTES", "1024"),
            ("SHARE_TTL_SECONDS", " 60 "),
            ("MAX_KEY_GENERATION_ATTEMPTS", "3"),
            ("RATE_LIMIT_READ_PER_MIN", "7"),
        ]));
        assert!(config.disable_share_create);
        assert_eq!(config.max_plaintext_bytes, 1024);
        assert_eq!(config.share_ttl_seconds, 60);
        assert_eq!(config.max_key_generation_attempts, 3);
        assert_eq!(config.rate_limit_read_per_min, 7);
        assert_eq!(config.rate_limit_create_per_min, 10);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = ShareConfig::from_lookup(lookup_from(&[
            ("DISABLE_SHARE_CREATE", "yes"),
            ("MAX_PLAINTEXT_BYTES", "0"),
            ("SHARE_TTL_SECONDS", "-5"),
            ("MAX_KEY_GENERATION_ATTEMPTS", "many"),
            ("RATE_LIMIT_CREATE_PER_DAY", ""),
        ]));
        assert_eq!(config, ShareConfig::default());
    }

    #[test]
    fn test_flag_accepts_one() {
        let config = ShareConfig::from_lookup(lookup_from(&[("DISABLE_SHARE_CREATE", "1")]));
        assert!(config.disable_share_create);
    }
}
