// MIT License - Copyright (c) 2021 TJForc
// Connection configuration

use std::time::Duration;

use crate::constants::{
    DEFAULT_PORT, LISTEN_TIMEOUT, LOGIN_TIMEOUT, SEND_LOCK_TIMEOUT, SHUTDOWN_JOIN_TIMEOUT,
    WRITE_TIMEOUT,
};

/// Configuration for connecting to an EnvisaLink.
#[derive(Debug, Clone)]
pub struct TpiConfig {
    /// EnvisaLink IP address or host name
    pub host: String,
    /// TPI TCP port (default: 4025)
    pub port: u16,
    /// TPI password (default: user)
    pub password: String,
    /// User code sent when the panel asks for one (`900`, `912`)
    pub access_code: Option<String>,
    /// Bounds the TCP connect and every read during login
    pub login_timeout: Duration,
    /// Read timeout once streaming
    pub listen_timeout: Duration,
    /// Bounds a single frame write
    pub write_timeout: Duration,
    /// Bounds waiting for the send lock
    pub lock_timeout: Duration,
    /// How long shutdown waits for the listener to exit
    pub shutdown_join_timeout: Duration,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for TpiConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.100".to_string(),
            port: DEFAULT_PORT,
            password: "user".to_string(),
            access_code: None,
            login_timeout: LOGIN_TIMEOUT,
            listen_timeout: LISTEN_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            lock_timeout: SEND_LOCK_TIMEOUT,
            shutdown_join_timeout: SHUTDOWN_JOIN_TIMEOUT,
            event_capacity: 256,
        }
    }
}

impl TpiConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> TpiConfigBuilder {
        TpiConfigBuilder::default()
    }

    /// `host:port` of the device.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for TpiConfig.
#[derive(Debug, Clone, Default)]
pub struct TpiConfigBuilder {
    config: TpiConfig,
}

impl TpiConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn access_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.config.access_code = if code.is_empty() { None } else { Some(code) };
        self
    }

    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    pub fn listen_timeout(mut self, timeout: Duration) -> Self {
        self.config.listen_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    pub fn shutdown_join_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_join_timeout = timeout;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> TpiConfig {
        self.config
    }
}
