//! HTTP client configuration.

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "tent-rs/1";
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Settings for the HTTP transport. Read once when the transport is built;
/// in-flight requests never see later changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for a whole request, including reading the response body.
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TENT_TIMEOUT_SECS`, `TENT_USER_AGENT` and
    /// `TENT_MAX_REDIRECTS`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("TENT_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!("Ignoring invalid TENT_TIMEOUT_SECS={raw:?}"),
            }
        }
        if let Some(agent) = lookup("TENT_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            config.user_agent = agent;
        }
        if let Some(raw) = lookup("TENT_MAX_REDIRECTS") {
            match raw.trim().parse() {
                Ok(n) => config.max_redirects = n,
                Err(_) => tracing::warn!("Ignoring invalid TENT_MAX_REDIRECTS={raw:?}"),
            }
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "tent-rs/1");
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TENT_TIMEOUT_SECS", "30"),
            ("TENT_USER_AGENT", "my-app/2"),
            ("TENT_MAX_REDIRECTS", "0"),
        ]));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, "my-app/2");
        assert_eq!(config.max_redirects, 0);
    }

    #[test]
    fn invalid_env_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TENT_TIMEOUT_SECS", "soon"),
            ("TENT_USER_AGENT", "  "),
            ("TENT_MAX_REDIRECTS", "-1"),
        ]));
        assert_eq!(config, ClientConfig::default());
    }
}
