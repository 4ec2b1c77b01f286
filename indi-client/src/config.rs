//! Client configuration.

use std::time::Duration;

use crate::error::ClientError;

/// Configuration for an [`IndiClient`](crate::IndiClient) connection.
///
/// Controls the server endpoint, the blocking accessors' timeout-handler
/// cadence, and the receive worker's read and reconnect behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname or IP address of the server.
    pub host: String,

    /// TCP port of the server.
    /// Default: 7624
    pub port: u16,

    /// How long a blocking accessor waits for a vector before invoking the
    /// timeout handler (it keeps waiting afterwards unless told to give up).
    /// Default: 1 second
    pub wait_timeout: Duration,

    /// Read timeout of the background receive worker's socket. Bounds how
    /// quickly the worker notices a shutdown request.
    /// Default: 50 milliseconds
    pub read_timeout: Duration,

    /// First delay before a reconnect attempt after the connection drops.
    /// Default: 500 milliseconds
    pub reconnect_initial_backoff: Duration,

    /// Upper bound for the doubling reconnect backoff.
    /// Default: 5 seconds
    pub reconnect_max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7624,
            wait_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_millis(50),
            reconnect_initial_backoff: Duration::from_millis(500),
            reconnect_max_backoff: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Configuration for the given endpoint with default timings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial_backoff = initial;
        self.reconnect_max_backoff = max;
        self
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.host.is_empty() {
            return Err(ClientError::Configuration("host must not be empty".to_string()));
        }
        if self.wait_timeout == Duration::ZERO {
            return Err(ClientError::Configuration(
                "wait timeout must be greater than 0".to_string(),
            ));
        }
        if self.read_timeout == Duration::ZERO {
            return Err(ClientError::Configuration(
                "read timeout must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_initial_backoff > self.reconnect_max_backoff {
            return Err(ClientError::Configuration(
                "initial reconnect backoff must not exceed the maximum".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 7624);
        assert_eq!(config.wait_timeout, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::new("telescope.local", 7624)
            .with_wait_timeout(Duration::from_millis(200))
            .with_reconnect_backoff(Duration::from_millis(10), Duration::from_millis(100));
        assert_eq!(config.host, "telescope.local");
        assert_eq!(config.wait_timeout, Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let empty_host = ClientConfig::new("", 7624);
        assert!(empty_host.validate().is_err());

        let inverted_backoff = ClientConfig::default()
            .with_reconnect_backoff(Duration::from_secs(10), Duration::from_secs(1));
        assert!(inverted_backoff.validate().is_err());

        let zero_wait = ClientConfig::default().with_wait_timeout(Duration::ZERO);
        assert!(zero_wait.validate().is_err());
    }
}
