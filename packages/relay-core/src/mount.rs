//! Per-mount controller: owns the page buffer, current metadata, source
//! state, and listener registry for one named audio channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::buffer::{CursorMode, PageBuffer};
use crate::error::{RelayError, RelayResult};
use crate::listener::ListenerSession;
use crate::pool::BytePool;
use crate::source::SourceSession;
use crate::state::MountConfig;

/// Basic auth credentials presented by a source or an admin request.
///
/// The username is accepted but not checked - Icecast source clients send an
/// arbitrary or fixed username and only the password is meaningful.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Compares two byte strings without leaking timing information about where
/// they first differ. Differing lengths short-circuit, which leaks length
/// but not content - acceptable for password comparison here.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// A named, independently-configured audio channel.
///
/// Mediates registration, limits, and credential checks; exclusively owns
/// its `PageBuffer`'s structural mutations via the buffer's own internal
/// lock. At most one source may be attached at a time (M1); listener
/// registrations are only accepted while a source is attached (M2);
/// metadata updates require both a matching credential and an attached
/// source (M3).
pub struct Mount {
    name: String,
    config: MountConfig,
    listener_limit: usize,
    pool: Arc<BytePool>,
    title: RwLock<String>,
    listener_count: AtomicUsize,
    source_present: AtomicBool,
    buffer: RwLock<Option<Arc<PageBuffer>>>,
    cancel: CancellationToken,
}

impl Mount {
    /// Creates a mount with no source attached and an empty title.
    ///
    /// `listener_limit` comes from the server-wide `RelayConfig`, not the
    /// per-mount config - the wire schema (spec.md §6) lists listener/source
    /// caps as top-level inputs, applied uniformly to every mount.
    #[must_use]
    pub fn new(config: MountConfig, listener_limit: usize, pool: Arc<BytePool>) -> Self {
        Self {
            name: config.name.clone(),
            config,
            listener_limit,
            pool,
            title: RwLock::new(String::new()),
            listener_count: AtomicUsize::new(0),
            source_present: AtomicBool::new(false),
            buffer: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    #[must_use]
    pub fn current_title(&self) -> String {
        self.title.read().clone()
    }

    #[must_use]
    pub fn has_source(&self) -> bool {
        self.source_present.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listener_count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Attaches a new source, verifying credentials and enforcing that at
    /// most one source is attached at a time.
    ///
    /// Checks credentials first so a rejected attempt never touches the
    /// attachment state; the attach itself uses compare-and-swap rather than
    /// "increment then check" so two concurrent attach attempts can never
    /// both observe success (P7).
    pub fn attach_source(self: &Arc<Self>, credentials: &Credentials) -> RelayResult<SourceSession> {
        if !constant_time_eq(credentials.password.as_bytes(), self.config.password.as_bytes()) {
            return Err(RelayError::AuthFailed(self.name.clone()));
        }
        self.source_present
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RelayError::SourceConflict(self.name.clone()))?;

        let buffer = Arc::new(PageBuffer::new(
            Arc::clone(&self.pool),
            self.config.buffer_max_pages,
            self.config.buffer_min_pages,
        ));
        *self.buffer.write() = Some(Arc::clone(&buffer));
        log::info!("mount {}: source attached", self.name);
        Ok(SourceSession::new(Arc::clone(self), buffer))
    }

    /// Attaches a new listener, enforcing the listener limit and that a
    /// source is currently attached (M2).
    pub fn attach_listener(
        self: &Arc<Self>,
        cursor_mode: CursorMode,
        wants_metadata: bool,
    ) -> RelayResult<ListenerSession> {
        if !self.has_source() {
            return Err(RelayError::NoSource(self.name.clone()));
        }

        loop {
            let current = self.listener_count.load(Ordering::Acquire);
            if current >= self.listener_limit {
                return Err(RelayError::ListenerLimit(self.name.clone()));
            }
            if self
                .listener_count
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        let buffer = match self.buffer.read().clone() {
            Some(buffer) => buffer,
            None => {
                self.listener_count.fetch_sub(1, Ordering::AcqRel);
                return Err(RelayError::NoSource(self.name.clone()));
            }
        };
        let cursor = match buffer.start_cursor(cursor_mode) {
            Some(cursor) => cursor,
            None => {
                self.listener_count.fetch_sub(1, Ordering::AcqRel);
                return Err(RelayError::NoSource(self.name.clone()));
            }
        };

        log::info!("mount {}: listener joined", self.name);
        Ok(ListenerSession::new(
            Arc::clone(self),
            buffer,
            cursor,
            wants_metadata,
        ))
    }

    /// Replaces the current title. Requires matching credentials and an
    /// attached source (M3); framers pick up the new title on their next
    /// scheduled insertion.
    pub fn update_meta(&self, credentials: &Credentials, title: String) -> RelayResult<()> {
        if !constant_time_eq(credentials.password.as_bytes(), self.config.password.as_bytes()) {
            return Err(RelayError::AuthFailed(self.name.clone()));
        }
        if !self.has_source() {
            return Err(RelayError::NoSource(self.name.clone()));
        }
        *self.title.write() = title;
        Ok(())
    }

    /// Called by the attached `SourceSession` once it has fully drained.
    /// Idempotent: safe to call even if a source was never attached.
    pub(crate) fn detach_source(&self) {
        self.source_present.store(false, Ordering::Release);
        *self.buffer.write() = None;
        log::info!("mount {}: source detached", self.name);
    }

    /// Called by a `ListenerSession` on close, whatever the reason.
    pub(crate) fn release_listener(&self) {
        self.listener_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Terminates any attached source and signals every listener to drain.
    /// Does not block on cursor release; callers needing that must poll
    /// `listener_count()`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, password: &str) -> MountConfig {
        MountConfig {
            name: name.to_string(),
            password: password.to_string(),
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

    fn mount(name: &str, password: &str) -> Arc<Mount> {
        Arc::new(Mount::new(
            config(name, password),
            2,
            Arc::new(BytePool::new(4096)),
        ))
    }

    #[test]
    fn attach_source_with_wrong_password_fails_auth() {
        let mount = mount("/stream", "correct");
        let creds = Credentials {
            username: "source".into(),
            password: "wrong".into(),
        };
        assert!(matches!(
            mount.attach_source(&creds),
            Err(RelayError::AuthFailed(_))
        ));
        assert!(!mount.has_source());
    }

    #[test]
    fn second_source_attach_fails_with_conflict() {
        let mount = mount("/stream", "pw");
        let creds = Credentials {
            username: "source".into(),
            password: "pw".into(),
        };
        let _first = mount.attach_source(&creds).unwrap();
        assert!(matches!(
            mount.attach_source(&creds),
            Err(RelayError::SourceConflict(_))
        ));
    }

    #[test]
    fn listener_rejected_without_source() {
        let mount = mount("/stream", "pw");
        assert!(matches!(
            mount.attach_listener(CursorMode::FromTail, false),
            Err(RelayError::NoSource(_))
        ));
    }

    #[test]
    fn update_meta_requires_matching_credentials_and_source() {
        let mount = mount("/stream", "pw");
        let creds = Credentials {
            username: "admin".into(),
            password: "pw".into(),
        };
        assert!(matches!(
            mount.update_meta(&creds, "X".into()),
            Err(RelayError::NoSource(_))
        ));

        let _source = mount.attach_source(&creds).unwrap();
        mount.update_meta(&creds, "X".into()).unwrap();
        assert_eq!(mount.current_title(), "X");

        let bad_creds = Credentials {
            username: "admin".into(),
            password: "nope".into(),
        };
        assert!(matches!(
            mount.update_meta(&bad_creds, "Y".into()),
            Err(RelayError::AuthFailed(_))
        ));
    }
}
