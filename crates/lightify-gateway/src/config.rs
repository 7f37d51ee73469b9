//! Gateway connection configuration.

use std::time::Duration;

use lightify_protocol::DEFAULT_PORT;

use crate::scheduler::SchedulerConfig;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway host name or IP address.
    pub host: String,

    /// Gateway TCP port.
    pub port: u16,

    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Timeout for a single request/response exchange.
    pub request_timeout: Duration,

    /// Base interval between device enumeration scans.
    pub poll_interval: Duration,

    /// Base interval between group enumeration scans.
    pub group_poll_interval: Duration,

    /// Maximum jitter added to the poll interval (fraction 0.0-1.0).
    pub poll_jitter: f64,

    /// How often a busy device info poll is repeated.
    pub busy_retries: u32,

    /// Delay between busy retries.
    pub busy_retry_delay: Duration,

    /// Scans an identity may be missing from before it is swept.
    pub grace_scans: u64,

    /// Maximum number of requests awaiting a response.
    pub max_pending: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
            group_poll_interval: Duration::from_secs(300),
            poll_jitter: 0.1,
            busy_retries: 3,
            busy_retry_delay: Duration::from_millis(500),
            grace_scans: 0,
            max_pending: 32,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration for the given gateway host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Builder: set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder: set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder: set group poll interval.
    pub fn with_group_poll_interval(mut self, interval: Duration) -> Self {
        self.group_poll_interval = interval;
        self
    }

    /// Builder: set busy retry policy.
    pub fn with_busy_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.busy_retries = retries;
        self.busy_retry_delay = delay;
        self
    }

    /// Builder: set grace scans.
    pub fn with_grace_scans(mut self, grace: u64) -> Self {
        self.grace_scans = grace;
        self
    }

    /// Builder: set max pending requests.
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Returns the `host:port` string to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the poll scheduler configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.poll_interval, self.group_poll_interval)
            .with_jitter(self.poll_jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.grace_scans, 0);
        assert_eq!(config.max_pending, 32);
    }

    #[test]
    fn custom_config() {
        let config = GatewayConfig::new("192.168.1.20")
            .with_port(4001)
            .with_request_timeout(Duration::from_millis(250))
            .with_busy_retries(5, Duration::from_millis(10))
            .with_grace_scans(2)
            .with_max_pending(4);

        assert_eq!(config.address(), "192.168.1.20:4001");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.busy_retries, 5);
        assert_eq!(config.busy_retry_delay, Duration::from_millis(10));
        assert_eq!(config.grace_scans, 2);
        assert_eq!(config.max_pending, 4);
    }

    #[test]
    fn scheduler_follows_poll_settings() {
        let config = GatewayConfig::default()
            .with_poll_interval(Duration::from_secs(12))
            .with_group_poll_interval(Duration::from_secs(120));
        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.device_interval, Duration::from_secs(12));
        assert_eq!(scheduler.group_interval, Duration::from_secs(120));
        assert_eq!(scheduler.jitter_fraction, 0.1);
    }
}
