//! Listener pacing and catch-up loop: Joining -> CatchingUp -> Live -> Closed.
//!
//! Delivers the stream to one client at its nominal bitrate, splicing in
//! metadata frames when the client asked for them. Runs as its own task,
//! pushing chunks into a bounded channel under an explicit write deadline -
//! driving the deadline from this side (rather than relying on the HTTP body
//! stream being polled) is what gives a stalled listener a real
//! `WriteTimeout` even when the underlying connection's TCP window is full
//! and nothing upstream is pulling on it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::buffer::{Cursor, PageBuffer};
use crate::error::{RelayError, RelayResult};
use crate::meta::MetaFramer;
use crate::mount::Mount;
use crate::protocol_constants::DEFAULT_POLL_INTERVAL_MS;

/// Coarse lifecycle phase, tracked for logging only - pacing behavior does
/// not change between `CatchingUp` and `Live` (the warm-up burst exists to
/// prime decoder framing, not to enable fast-forwarding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CatchingUp,
    Live,
}

/// A per-listener cursor, pacer, and metadata splicer.
pub struct ListenerSession {
    mount: Arc<Mount>,
    buffer: Arc<PageBuffer>,
    cursor: Option<Cursor>,
    offset: usize,
    wants_metadata: bool,
    meta_int: usize,
    bytes_since_meta: usize,
    framer: MetaFramer,
    bitrate_bps: u32,
    bytes_sent: u64,
    started_at: Instant,
    write_timeout: Duration,
    poll_interval: Duration,
    phase: Phase,
}

impl ListenerSession {
    pub(crate) fn new(
        mount: Arc<Mount>,
        buffer: Arc<PageBuffer>,
        cursor: Cursor,
        wants_metadata: bool,
    ) -> Self {
        let config = mount.config();
        let meta_int = config.meta_int_bytes;
        let wants_metadata = wants_metadata && meta_int > 0;
        Self {
            bitrate_bps: config.bitrate_bps,
            write_timeout: Duration::from_millis(config.write_timeout_ms),
            mount,
            buffer,
            cursor: Some(cursor),
            offset: 0,
            wants_metadata,
            meta_int,
            bytes_since_meta: 0,
            framer: MetaFramer::new(),
            bytes_sent: 0,
            started_at: Instant::now(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            phase: Phase::CatchingUp,
        }
    }

    /// Whether this listener negotiated metadata injection. The HTTP layer
    /// uses this to decide whether to advertise `icy-metaint`.
    #[must_use]
    pub fn wants_metadata(&self) -> bool {
        self.wants_metadata
    }

    /// The metadata interval in bytes, if metadata is enabled.
    #[must_use]
    pub fn meta_int(&self) -> usize {
        self.meta_int
    }

    /// Drives the delivery loop, pushing chunks into `tx` until the listener
    /// errors, times out, or the mount finishes draining with nothing left
    /// to send. Failures are swallowed here by design (§7: "a single
    /// listener's failure must never affect the source or any other
    /// listener") - the caller only needs to know the task has ended.
    pub async fn run(mut self, tx: mpsc::Sender<Bytes>) {
        let cancel = self.mount.cancel_token();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(()),
            result = self.drive(&tx) => result,
        };
        if let Err(e) = outcome {
            log::info!("mount {}: listener closed: {e}", self.mount.name());
        }
    }

    async fn drive(&mut self, tx: &mpsc::Sender<Bytes>) -> RelayResult<()> {
        loop {
            self.update_phase();

            let page = self
                .cursor
                .as_ref()
                .expect("cursor present between iterations")
                .page()
                .clone();

            if self.offset >= page.len() {
                let cursor = self.cursor.take().expect("cursor present");
                let (cursor, done) = self.buffer.advance(cursor);
                self.cursor = Some(cursor);
                self.offset = 0;
                if done {
                    if !self.mount.has_source() {
                        log::info!("mount {}: listener drained to end of stream", self.mount.name());
                        return Ok(());
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                continue;
            }

            let remaining = &page.bytes()[self.offset..];
            let send_len = if self.wants_metadata {
                remaining.len().min(self.meta_int - self.bytes_since_meta)
            } else {
                remaining.len()
            };

            self.send(tx, Bytes::copy_from_slice(&remaining[..send_len]))
                .await?;
            self.offset += send_len;
            self.bytes_sent += send_len as u64;

            if self.wants_metadata {
                self.bytes_since_meta += send_len;
                if self.bytes_since_meta >= self.meta_int {
                    let title = self.mount.current_title();
                    let frame = self.framer.next_frame(&title);
                    self.send(tx, Bytes::from(frame)).await?;
                    self.bytes_since_meta = 0;
                }
            }

            self.pace().await;
        }
    }

    async fn send(&self, tx: &mpsc::Sender<Bytes>, chunk: Bytes) -> RelayResult<()> {
        match timeout(self.write_timeout, tx.send(chunk)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::ListenerWrite(self.mount.name().to_string())),
            Err(_elapsed) => Err(RelayError::ListenerTimeout(self.mount.name().to_string())),
        }
    }

    /// Leaky-bucket pacer: sleeps to bring delivered bytes/sec back to the
    /// mount's nominal bitrate, smoothing bursty buffer reads regardless of
    /// catch-up phase.
    async fn pace(&self) {
        if self.bitrate_bps == 0 {
            return;
        }
        let ideal = Duration::from_secs_f64(self.bytes_sent as f64 / f64::from(self.bitrate_bps));
        let actual = self.started_at.elapsed();
        if ideal > actual {
            tokio::time::sleep(ideal - actual).await;
        }
    }

    fn update_phase(&mut self) {
        if self.phase == Phase::Live {
            return;
        }
        let Some(cursor) = &self.cursor else { return };
        if let Some(tail) = self.buffer.tail() {
            if cursor.page().seq() == tail.seq() {
                self.phase = Phase::Live;
                log::debug!("mount {}: listener reached live tail", self.mount.name());
            }
        }
    }
}

impl Drop for ListenerSession {
    fn drop(&mut self) {
        self.mount.release_listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CursorMode;
    use crate::mount::Credentials;
    use crate::pool::BytePool;
    use crate::state::MountConfig;
    use std::io::Cursor as IoCursor;

    fn config(bitrate_bps: u32, meta_int_bytes: usize, write_timeout_ms: u64) -> MountConfig {
        MountConfig {
            name: "/stream".to_string(),
            password: "pw".to_string(),
            content_type: "audio/mpeg".to_string(),
            bitrate_bps,
            meta_int_bytes,
            buffer_max_pages: 256,
            buffer_min_pages: 32,
            source_idle_ms: 10_000,
            empty_buffer_idle_ms: 10_000,
            write_timeout_ms,
        }
    }

    fn mount_with(cfg: MountConfig) -> Arc<Mount> {
        Arc::new(Mount::new(cfg, 10, Arc::new(BytePool::new(4096))))
    }

    /// Attaches a source and appends `data` as a single page, leaving the
    /// source "connected" (the returned `SourceSession` is simply dropped
    /// without calling `run`, which never flips `has_source` back off).
    async fn attach_source_and_append(mount: &Arc<Mount>, data: &[u8]) {
        let session = mount
            .attach_source(&Credentials {
                username: "source".into(),
                password: "pw".into(),
            })
            .unwrap();
        let buffer = Arc::clone(session.buffer());
        let mut src = IoCursor::new(data.to_vec());
        buffer.append(&mut src).await.unwrap();
    }

    #[tokio::test]
    async fn delivers_buffered_bytes_without_metadata() {
        let mount = mount_with(config(16_000, 0, 5_000));
        attach_source_and_append(&mount, b"abcd").await;

        let session = mount.attach_listener(CursorMode::FromTail, false).unwrap();
        assert!(!session.wants_metadata());

        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(tx));

        let chunk = rx.recv().await.unwrap();
        assert_eq!(&chunk[..], b"abcd");

        mount.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn splices_metadata_frame_at_configured_interval() {
        let mount = mount_with(config(16_000, 4, 5_000));
        attach_source_and_append(&mount, b"abcdefgh").await;

        let session = mount.attach_listener(CursorMode::FromTail, true).unwrap();
        assert!(session.wants_metadata());
        assert_eq!(session.meta_int(), 4);

        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(tx));

        // FromTail lands on the single page already appended ("abcdefgh");
        // after the first 4 bytes a metadata frame is due.
        let audio = rx.recv().await.unwrap();
        assert_eq!(&audio[..], b"abcd");
        let meta = rx.recv().await.unwrap();
        assert_eq!(&meta[..], &[0][..]); // title never set -> zero-length frame
        let rest = rx.recv().await.unwrap();
        assert_eq!(&rest[..], b"efgh");

        mount.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn ignores_metadata_request_when_mount_disables_it() {
        let mount = mount_with(config(16_000, 0, 5_000));
        attach_source_and_append(&mount, b"abcd").await;

        // meta_int_bytes == 0 means metadata is disabled regardless of ask.
        let session = mount.attach_listener(CursorMode::FromTail, true).unwrap();
        assert!(!session.wants_metadata());
        mount.close();
    }

    #[tokio::test]
    async fn drive_ends_once_source_detaches_and_cursor_drains() {
        let mount = mount_with(config(16_000, 0, 5_000));
        let source = mount
            .attach_source(&Credentials {
                username: "source".into(),
                password: "pw".into(),
            })
            .unwrap();
        let buffer = Arc::clone(source.buffer());
        let mut src = IoCursor::new(b"abcd".to_vec());
        buffer.append(&mut src).await.unwrap();

        let listener = mount.attach_listener(CursorMode::FromTail, false).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(listener.run(tx));

        let chunk = rx.recv().await.unwrap();
        assert_eq!(&chunk[..], b"abcd");

        // Source disconnects cleanly with nothing further queued; the
        // listener should notice it has drained to the end of the stream
        // and finish on its own, without needing `mount.close()`.
        source.run(IoCursor::new(Vec::<u8>::new())).await.unwrap();

        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_session_releases_listener_count() {
        let mount = mount_with(config(16_000, 0, 5_000));
        attach_source_and_append(&mount, b"abcd").await;

        let session = mount.attach_listener(CursorMode::FromTail, false).unwrap();
        assert_eq!(mount.listener_count(), 1);
        drop(session);
        assert_eq!(mount.listener_count(), 0);
    }
}
