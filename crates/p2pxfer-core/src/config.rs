//! Configuration for a transfer session.
//!
//! Resolution order: environment variables → defaults. There is no config
//! file here: unlike a long-lived daemon identity, a transfer session has
//! nothing to persist between runs.

use serde::{Deserialize, Serialize};

/// Tunables named by the external interfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub chunk_size: u32,
    pub max_parallel_chunks: u32,
    pub request_batch_size: u32,
    pub connect_timeout_ms: u64,
    pub socket_read_timeout_ms: u64,
    pub aead_info_string: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 262_144,
            max_parallel_chunks: 4,
            request_batch_size: 8,
            connect_timeout_ms: 30_000,
            socket_read_timeout_ms: 10_000,
            aead_info_string: "P2P-FileShare-AES".to_string(),
        }
    }
}

impl Config {
    /// Build a config from defaults, overridden by `P2PXFER_*` environment
    /// variables where present.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("P2PXFER_CHUNK_SIZE") {
            if let Ok(v) = v.parse() {
                self.chunk_size = v;
            }
        }
        if let Ok(v) = std::env::var("P2PXFER_MAX_PARALLEL_CHUNKS") {
            if let Ok(v) = v.parse() {
                self.max_parallel_chunks = v;
            }
        }
        if let Ok(v) = std::env::var("P2PXFER_REQUEST_BATCH_SIZE") {
            if let Ok(v) = v.parse() {
                self.request_batch_size = v;
            }
        }
        if let Ok(v) = std::env::var("P2PXFER_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = v.parse() {
                self.connect_timeout_ms = v;
            }
        }
        if let Ok(v) = std::env::var("P2PXFER_SOCKET_READ_TIMEOUT_MS") {
            if let Ok(v) = v.parse() {
                self.socket_read_timeout_ms = v;
            }
        }
        // aead_info_string is fixed by the protocol; not overridable.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes tests that mutate process environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_configuration_options() {
        let c = Config::default();
        assert_eq!(c.chunk_size, 262_144);
        assert_eq!(c.max_parallel_chunks, 4);
        assert_eq!(c.request_batch_size, 8);
        assert_eq!(c.connect_timeout_ms, 30_000);
        assert_eq!(c.socket_read_timeout_ms, 10_000);
        assert_eq!(c.aead_info_string, "P2P-FileShare-AES");
    }

    #[test]
    fn env_override_applies() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("P2PXFER_CHUNK_SIZE", "1024");
        let c = Config::from_env();
        std::env::remove_var("P2PXFER_CHUNK_SIZE");
        assert_eq!(c.chunk_size, 1024);
    }

    #[test]
    fn malformed_env_override_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("P2PXFER_MAX_PARALLEL_CHUNKS", "not-a-number");
        let c = Config::from_env();
        std::env::remove_var("P2PXFER_MAX_PARALLEL_CHUNKS");
        assert_eq!(c.max_parallel_chunks, 4);
    }
}
