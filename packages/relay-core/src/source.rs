//! Source ingest state machine: Authenticating -> Streaming -> Draining -> Closed.
//!
//! `Authenticating` is handled by `Mount::attach_source` before a
//! `SourceSession` even exists - by the time one is constructed, credentials
//! have already been checked and the mount has recorded the attach. This
//! type only drives `Streaming` and the transition into `Draining`/`Closed`.

use std::time::Duration;

use tokio::io::AsyncRead;

use crate::buffer::PageBuffer;
use crate::error::{RelayError, RelayResult};
use crate::mount::Mount;
use std::sync::Arc;

/// An attached source's ingest loop driver.
pub struct SourceSession {
    mount: Arc<Mount>,
    buffer: Arc<PageBuffer>,
}

impl SourceSession {
    pub(crate) fn new(mount: Arc<Mount>, buffer: Arc<PageBuffer>) -> Self {
        Self { mount, buffer }
    }

    /// The page buffer this source is appending to.
    #[must_use]
    pub fn buffer(&self) -> &Arc<PageBuffer> {
        &self.buffer
    }

    /// Runs the ingest loop against `src` until the source disconnects,
    /// errors, is cancelled by `Mount::close`, or idles out.
    ///
    /// On any exit path the mount is notified that its source has detached
    /// (M1/M2's "source-present" flips back to false) before this returns,
    /// so callers don't need their own cleanup.
    pub async fn run<R>(self, mut src: R) -> RelayResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let cancel = self.mount.cancel_token();
        let empty_timeout = Duration::from_millis(self.mount.config().empty_buffer_idle_ms);
        let idle_timeout = Duration::from_millis(self.mount.config().source_idle_ms);

        let mut appended_once = false;
        let result = loop {
            let window = if appended_once {
                idle_timeout
            } else {
                empty_timeout
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                outcome = tokio::time::timeout(window, self.buffer.append(&mut src)) => {
                    match outcome {
                        Err(_elapsed) if !appended_once => {
                            break Err(RelayError::SourceTimeout(self.mount.name().to_string()));
                        }
                        Err(_elapsed) => {
                            log::info!("mount {}: source idle timeout, draining", self.mount.name());
                            break Ok(());
                        }
                        Ok(Ok(None)) => {
                            log::info!("mount {}: source closed connection", self.mount.name());
                            break Ok(());
                        }
                        Ok(Ok(Some(_))) => {
                            appended_once = true;
                            self.buffer.truncate();
                        }
                        Ok(Err(e)) => break Err(e),
                    }
                }
            }
        };

        self.mount.detach_source();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CursorMode;
    use crate::mount::{Credentials, Mount};
    use crate::pool::BytePool;
    use crate::state::MountConfig;
    use std::io::Cursor as IoCursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::AsyncReadExt;

    fn config() -> MountConfig {
        MountConfig {
            name: "/stream".to_string(),
            password: "pw".to_string(),
            content_type: "audio/mpeg".to_string(),
            bitrate_bps: 16_000,
            meta_int_bytes: 16_000,
            buffer_max_pages: 256,
            buffer_min_pages: 32,
            source_idle_ms: 50,
            empty_buffer_idle_ms: 50,
            write_timeout_ms: 5_000,
        }
    }

    fn mount() -> Arc<Mount> {
        Arc::new(Mount::new(config(), 4, Arc::new(BytePool::new(4096))))
    }

    fn attach(mount: &Arc<Mount>) -> SourceSession {
        mount
            .attach_source(&Credentials {
                username: "source".into(),
                password: "pw".into(),
            })
            .unwrap()
    }

    /// An `AsyncRead` that never produces a byte and never reaches EOF,
    /// standing in for a source that connects but never sends audio.
    struct Stalled;

    impl AsyncRead for Stalled {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn never_sending_source_times_out_as_source_timeout() {
        let mount = mount();
        let session = attach(&mount);
        let result = session.run(Stalled).await;
        assert!(matches!(result, Err(RelayError::SourceTimeout(_))));
        assert!(!mount.has_source());
    }

    #[tokio::test]
    async fn source_that_sends_then_stalls_drains_instead_of_erroring() {
        let mount = mount();
        let session = attach(&mount);
        let buffer = Arc::clone(session.buffer());
        let src = IoCursor::new(b"abcd".to_vec()).chain(Stalled);
        let result = session.run(src).await;
        assert!(result.is_ok());
        assert!(!mount.has_source());
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn closed_connection_drains_cleanly() {
        let mount = mount();
        let session = attach(&mount);
        let src = IoCursor::new(b"abcd".to_vec());
        let result = session.run(src).await;
        assert!(result.is_ok());
        assert!(!mount.has_source());
    }

    #[tokio::test]
    async fn mount_close_cancels_an_in_flight_source() {
        let mount = mount();
        let session = attach(&mount);
        mount.close();
        let result = session.run(Stalled).await;
        assert!(result.is_ok());
        assert!(!mount.has_source());
    }

    #[tokio::test]
    async fn attaching_a_listener_after_source_closes_fails() {
        let mount = mount();
        let session = attach(&mount);
        let src = IoCursor::new(b"abcd".to_vec());
        session.run(src).await.unwrap();
        assert!(matches!(
            mount.attach_listener(CursorMode::FromTail, false),
            Err(RelayError::NoSource(_))
        ));
    }
}
