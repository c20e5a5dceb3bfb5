// src/utils/env.rs

use log::{debug, warn};

/// Loads variables from a `.env` file in the working directory (or a parent), if any.
/// Variables already set in the process environment win.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(dotenv::Error::Io(_)) => debug!("No .env file found, using process environment"),
        Err(e) => warn!("⚠️ Failed to parse .env file: {}", e),
    }
}

/// Reads a variable and parses it, falling back to `default` when missing or malformed.
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Non-empty string variable.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_or_parses_and_falls_back() {
        env::set_var("DEDUPE_TEST_ENV_OR", " 42 ");
        assert_eq!(env_or("DEDUPE_TEST_ENV_OR", 7usize), 42);
        env::set_var("DEDUPE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("DEDUPE_TEST_ENV_OR", 7usize), 7);
        env::remove_var("DEDUPE_TEST_ENV_OR");
        assert_eq!(env_or("DEDUPE_TEST_ENV_OR", 7usize), 7);
    }

    #[test]
    fn test_env_opt_skips_blank() {
        env::set_var("DEDUPE_TEST_ENV_OPT", "   ");
        assert_eq!(env_opt("DEDUPE_TEST_ENV_OPT"), None);
        env::set_var("DEDUPE_TEST_ENV_OPT", "acme");
        assert_eq!(env_opt("DEDUPE_TEST_ENV_OPT").as_deref(), Some("acme"));
        env::remove_var("DEDUPE_TEST_ENV_OPT");
    }
}
