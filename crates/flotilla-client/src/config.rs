use std::time::Duration;

/// Fixed poll interval for the incremental live-values fetch.
pub const DEFAULT_LIVE_INTERVAL: Duration = Duration::from_secs(3);
/// The aggregate resources fragment changes slowly; refresh it rarely.
pub const DEFAULT_RESOURCE_INTERVAL: Duration = Duration::from_secs(30);
/// Per-request timeout; expiry counts as a plain request failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend prefix, e.g. `https://ci.example.com/cicd`.
    pub base_url: String,
    pub live_interval: Duration,
    pub resource_interval: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            live_interval: DEFAULT_LIVE_INTERVAL,
            resource_interval: DEFAULT_RESOURCE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:8000/cicd");
        assert_eq!(config.live_interval, Duration::from_secs(3));
        assert_eq!(config.resource_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }
}
