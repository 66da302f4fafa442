use serde_derive::Deserialize;

use crate::consts;

#[derive(Deserialize, Default)]
pub struct Config {
    /// TCP port to listen on. Defaults to 6767.
    pub port: Option<u16>,
    /// Path to the persisted SSH host key. Generated on first startup if
    /// missing. Defaults to "parlor_host_key" in the working directory.
    pub host_key_path: Option<String>,
    /// Max connections a single source IP may open within the rate-limit
    /// window. Defaults to 5.
    pub rate_limit_max_connections: Option<usize>,
    /// Width, in seconds, of the rate-limiter's sliding window. Defaults
    /// to 60.
    pub rate_limit_window_secs: Option<u64>,
    /// How often the inactivity supervisor polls each session, in
    /// seconds. Defaults to 30.
    pub supervisor_poll_secs: Option<u64>,
    /// Idle seconds after which a session is warned it will be
    /// disconnected. Defaults to 240.
    pub inactivity_warn_secs: Option<u64>,
    /// Idle seconds after which a session is evicted. Defaults to 300.
    pub inactivity_evict_secs: Option<u64>,
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(consts::DEFAULT_PORT)
    }

    pub fn host_key_path(&self) -> String {
        self.host_key_path.clone().unwrap_or_else(|| "parlor_host_key".to_string())
    }

    pub fn rate_limit_max_connections(&self) -> usize {
        self.rate_limit_max_connections.unwrap_or(consts::RATE_LIMIT_MAX_CONNECTIONS)
    }

    pub fn rate_limit_window(&self) -> std::time::Duration {
        self.rate_limit_window_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(consts::RATE_LIMIT_WINDOW)
    }

    pub fn supervisor_poll_interval(&self) -> std::time::Duration {
        self.supervisor_poll_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(consts::SUPERVISOR_POLL_INTERVAL)
    }

    pub fn inactivity_warn_threshold(&self) -> std::time::Duration {
        self.inactivity_warn_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(consts::INACTIVITY_WARN_THRESHOLD)
    }

    pub fn inactivity_evict_threshold(&self) -> std::time::Duration {
        self.inactivity_evict_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(consts::INACTIVITY_EVICT_THRESHOLD)
    }
}
