//! Core configuration types.
//!
//! Materialized configuration values the CORE operates on. The wire format
//! these are read from (YAML, env overrides) is handled above this crate, in
//! the server binary's own config loader; these types only need to be
//! deserializable and self-validating.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_BUFFER_MAX_PAGES, DEFAULT_BUFFER_MIN_PAGES, DEFAULT_EMPTY_BUFFER_IDLE_MS,
    DEFAULT_META_INT_BYTES, DEFAULT_PAGE_CAPACITY, DEFAULT_SOURCE_IDLE_MS,
    DEFAULT_WRITE_TIMEOUT_MS,
};

/// Per-mount configuration, named directly from the external config schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Path segment identifying the mount, e.g. `"/stream.mp3"`.
    pub name: String,
    /// Password a source must present to attach.
    pub password: String,
    /// Declared `Content-Type` echoed to listeners.
    pub content_type: String,
    /// Nominal bitrate in bytes/sec, used for listener pacing and `icy-br`.
    pub bitrate_bps: u32,
    /// Metadata insertion interval in bytes; 0 disables metadata entirely.
    #[serde(default = "default_meta_int_bytes")]
    pub meta_int_bytes: usize,
    /// Hard maximum page count before truncation evicts.
    #[serde(default = "default_buffer_max_pages")]
    pub buffer_max_pages: usize,
    /// Soft minimum page count truncation will not evict below.
    #[serde(default = "default_buffer_min_pages")]
    pub buffer_min_pages: usize,
    /// Idle timeout (ms) for a source that stops sending mid-stream.
    #[serde(default = "default_source_idle_ms")]
    pub source_idle_ms: u64,
    /// Timeout (ms) for a source that never delivers a first byte.
    #[serde(default = "default_empty_buffer_idle_ms")]
    pub empty_buffer_idle_ms: u64,
    /// Write deadline (ms) for a listener connection.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_meta_int_bytes() -> usize {
    DEFAULT_META_INT_BYTES
}
fn default_buffer_max_pages() -> usize {
    DEFAULT_BUFFER_MAX_PAGES
}
fn default_buffer_min_pages() -> usize {
    DEFAULT_BUFFER_MIN_PAGES
}
fn default_source_idle_ms() -> u64 {
    DEFAULT_SOURCE_IDLE_MS
}
fn default_empty_buffer_idle_ms() -> u64 {
    DEFAULT_EMPTY_BUFFER_IDLE_MS
}
fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

impl MountConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("mount name must not be empty".to_string());
        }
        if self.buffer_min_pages == 0 {
            return Err("buffer_min_pages must be >= 1".to_string());
        }
        if self.buffer_max_pages < self.buffer_min_pages {
            return Err("buffer_max_pages must be >= buffer_min_pages".to_string());
        }
        if self.bitrate_bps == 0 {
            return Err("bitrate_bps must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Server-wide relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Port the HTTP listener binds to.
    pub bind_port: u16,
    /// Server-wide concurrent listener cap, applied per mount.
    pub listener_limit: usize,
    /// Server-wide concurrent source cap (mounts attach at most one each;
    /// this bounds how many mounts may have a source attached at once).
    pub source_limit: usize,
    /// Page capacity in bytes shared by the process-wide `BytePool`.
    #[serde(default = "default_page_capacity")]
    pub page_capacity: usize,
    /// Configured mounts.
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

fn default_page_capacity() -> usize {
    DEFAULT_PAGE_CAPACITY
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_port: 8000,
            listener_limit: 100,
            source_limit: 10,
            page_capacity: DEFAULT_PAGE_CAPACITY,
            mounts: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Validates the configuration, including every configured mount.
    pub fn validate(&self) -> Result<(), String> {
        if self.listener_limit == 0 {
            return Err("listener_limit must be >= 1".to_string());
        }
        if self.source_limit == 0 {
            return Err("source_limit must be >= 1".to_string());
        }
        if self.page_capacity == 0 {
            return Err("page_capacity must be >= 1".to_string());
        }
        for mount in &self.mounts {
            mount.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mount() -> MountConfig {
        MountConfig {
            name: "/stream".to_string(),
            password: "hunter2".to_string(),
            content_type: "audio/mpeg".to_string(),
            bitrate_bps: 16_000,
            meta_int_bytes: 16_000,
            buffer_max_pages: 256,
            buffer_min_pages: 32,
            source_idle_ms: 10_000,
            empty_buffer_idle_ms: 10_000,
            write_timeout_ms: 5_000,
        }
    }

    #[test]
    fn relay_config_default_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn mount_config_rejects_empty_name() {
        let mut mount = sample_mount();
        mount.name.clear();
        assert!(mount.validate().is_err());
    }

    #[test]
    fn mount_config_rejects_max_below_min() {
        let mut mount = sample_mount();
        mount.buffer_max_pages = 1;
        mount.buffer_min_pages = 32;
        assert!(mount.validate().is_err());
    }

    #[test]
    fn relay_config_validates_nested_mounts() {
        let mut config = RelayConfig::default();
        let mut bad_mount = sample_mount();
        bad_mount.bitrate_bps = 0;
        config.mounts.push(bad_mount);
        assert!(config.validate().is_err());
    }
}
