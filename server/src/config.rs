use std::{env, time::Duration};

use ableton_proto::DEFAULT_MAX_FRAME_BYTES;

use crate::ipc::path::{Endpoint, default_endpoint, parse_endpoint};

/// Settings for the connection to the Live OSC daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcConfig {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub max_frame_length: usize,
    /// Connect at startup instead of on the first request.
    pub connect_on_start: bool,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout: Duration::from_millis(2000),
            call_timeout: Duration::from_millis(7000),
            max_frame_length: DEFAULT_MAX_FRAME_BYTES,
            connect_on_start: true,
        }
    }
}

impl IpcConfig {
    pub const ENV_ENDPOINT: &str = "ABLETON_DAEMON_ENDPOINT";
    pub const ENV_CONNECT_TIMEOUT: &str = "ABLETON_DAEMON_CONNECT_TIMEOUT_MS";
    pub const ENV_CALL_TIMEOUT: &str = "ABLETON_DAEMON_CALL_TIMEOUT_MS";
    pub const ENV_MAX_FRAME: &str = "ABLETON_DAEMON_MAX_FRAME_BYTES";
    pub const ENV_CONNECT_ON_START: &str = "ABLETON_DAEMON_CONNECT_ON_START";

    /// Construct from real process environment variables.
    pub fn from_env() -> Self {
        Self::from_reader(|k| env::var(k).ok())
    }

    /// Construct from an arbitrary key/value source (for tests).
    pub fn from_map<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        use std::collections::HashMap;
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_reader(|k| map.get(k).cloned())
    }

    fn from_reader<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = get(Self::ENV_ENDPOINT)
            && !raw.trim().is_empty()
        {
            cfg.endpoint = parse_endpoint(&raw);
        }
        if let Some(ms) = parse_u64(get(Self::ENV_CONNECT_TIMEOUT)) {
            cfg.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(get(Self::ENV_CALL_TIMEOUT)) {
            cfg.call_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_u64(get(Self::ENV_MAX_FRAME))
            && bytes > 0
        {
            cfg.max_frame_length = usize::try_from(bytes).unwrap_or(usize::MAX);
        }
        if let Some(raw) = get(Self::ENV_CONNECT_ON_START) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => cfg.connect_on_start = true,
                "0" | "false" | "no" | "off" => cfg.connect_on_start = false,
                _ => {}
            }
        }

        cfg
    }
}

fn parse_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub ipc: IpcConfig,
}

impl ServerConfig {
    pub fn load() -> Self {
        Self {
            ipc: IpcConfig::from_env(),
        }
    }

    /// Command-line values win over the environment.
    pub fn with_overrides(mut self, endpoint: Option<&str>, call_timeout_ms: Option<u64>) -> Self {
        if let Some(endpoint) = endpoint {
            self.ipc.endpoint = parse_endpoint(endpoint);
        }
        if let Some(ms) = call_timeout_ms {
            self.ipc.call_timeout = Duration::from_millis(ms);
        }
        self
    }
}
