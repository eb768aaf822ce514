//! WebSocket client configuration.

use std::time::Duration;

/// Settings for one WebSocket client connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint URL, e.g. `ws://localhost:6700/`.
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub access_token: Option<String>,
    /// Whether to automatically reconnect on disconnect.
    pub auto_reconnect: bool,
    /// Maximum number of consecutive reconnection attempts (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay between reconnection attempts.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// How long an API call waits for its response.
    pub api_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: endpoint_url("localhost", 6700),
            access_token: None,
            auto_reconnect: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            api_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Config for the universal endpoint at `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            url: endpoint_url(host, port),
            ..Default::default()
        }
    }

    /// Sets the access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Disables reconnection.
    pub fn no_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }
}

/// The universal endpoint carries both events and API calls on `/`.
pub fn endpoint_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}/")
}

/// Reconnection delay schedule.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_retries: Option<u32>,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            initial: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            max_retries: config.max_retries,
            attempts: 0,
            delay: config.initial_delay,
        }
    }

    /// Delay before the next attempt, or `None` once retries are exhausted.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        let delay = self.delay;
        self.attempts += 1;
        self.delay = self
            .max
            .min(Duration::from_secs_f64(self.delay.as_secs_f64() * self.multiplier));
        Some(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.delay = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(ClientConfig::new("127.0.0.1", 6700).url, "ws://127.0.0.1:6700/");
        assert_eq!(ClientConfig::default().url, "ws://localhost:6700/");
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = ClientConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        let mut backoff = Backoff::new(&config);
        let delays: Vec<_> = (0..5).filter_map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 5, 5].map(Duration::from_secs).to_vec()
        );

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_backoff_gives_up() {
        let config = ClientConfig::default().with_max_retries(2);
        let mut backoff = Backoff::new(&config);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
    }
}
