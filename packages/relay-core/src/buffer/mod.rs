//! Single-producer, many-consumer ordered sequence of opaque byte pages with
//! reference-counted retention.
//!
//! The buffer grows monotonically as a source appends pages, then shrinks
//! from the head once it exceeds its hard maximum - subject to any cursor
//! still pinning a page. Eviction is strictly FIFO: a pinned page blocks
//! eviction of everything behind it too, since dropping an unpinned page that
//! precedes a pinned one would orphan the chain a still-active cursor may
//! later want to walk forward from.

mod page;

pub use page::{Cursor, Page};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::RelayError;
use crate::pool::BytePool;

/// Where a newly-joined listener's cursor should start.
#[derive(Debug, Clone, Copy)]
pub enum CursorMode {
    /// Start exactly at the current tail - "live" playback with no warm-up.
    FromTail,
    /// Start `k` pages behind the tail (clamped to the head), delivering a
    /// warm-up burst so decoders can synchronize framing quickly.
    FromRecent(usize),
}

struct Inner {
    head: Option<Arc<Page>>,
    tail: Option<Arc<Page>>,
    len: usize,
    total_appended: u64,
}

/// An ordered, singly-linked, refcount-pinned sequence of pages.
pub struct PageBuffer {
    pool: Arc<BytePool>,
    max_pages: usize,
    min_pages: usize,
    inner: Mutex<Inner>,
}

impl PageBuffer {
    /// Creates an empty buffer backed by `pool`, retaining at most
    /// `max_pages` pages under normal conditions and never evicting below
    /// `min_pages`.
    #[must_use]
    pub fn new(pool: Arc<BytePool>, max_pages: usize, min_pages: usize) -> Self {
        Self {
            pool,
            max_pages,
            min_pages: min_pages.min(max_pages).max(1),
            inner: Mutex::new(Inner {
                head: None,
                tail: None,
                len: 0,
                total_appended: 0,
            }),
        }
    }

    /// Reads up to one page capacity worth of bytes from `src` and, if any
    /// bytes were read, links a new page as the tail.
    ///
    /// Returns `Ok(None)` on a zero-byte read (source produced nothing this
    /// call - the caller's idle-timeout bookkeeping handles that, not the
    /// buffer). The new page's link-publish (setting the previous tail's
    /// `next` and swapping `tail`) happens entirely under the structural
    /// mutex, so no cursor can observe a partially-linked page.
    pub async fn append<R>(&self, src: &mut R) -> Result<Option<(Arc<Page>, usize)>, RelayError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = self.pool.acquire();
        buf.resize(self.pool.capacity(), 0);
        let n = src
            .read(&mut buf)
            .await
            .map_err(|e| RelayError::SourceRead(e.to_string()))?;
        if n == 0 {
            self.pool.release(buf);
            return Ok(None);
        }
        buf.truncate(n);

        let mut inner = self.inner.lock();
        let seq = inner.total_appended;
        let page = Arc::new(Page::new(buf, seq));

        match inner.tail.clone() {
            Some(old_tail) => old_tail.link_next(Arc::clone(&page)),
            None => inner.head = Some(Arc::clone(&page)),
        }
        inner.tail = Some(Arc::clone(&page));
        inner.len += 1;
        inner.total_appended += 1;

        Ok(Some((page, n)))
    }

    /// A snapshot of the oldest page still retained.
    #[must_use]
    pub fn head(&self) -> Option<Arc<Page>> {
        self.inner.lock().head.clone()
    }

    /// A snapshot of the newest page.
    #[must_use]
    pub fn tail(&self) -> Option<Arc<Page>> {
        self.inner.lock().tail.clone()
    }

    /// Current retained page count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total pages ever appended, including pages since evicted.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.inner.lock().total_appended
    }

    /// Starts a cursor at the position `mode` describes. Returns `None` only
    /// if the buffer has never had a page appended.
    #[must_use]
    pub fn start_cursor(&self, mode: CursorMode) -> Option<Cursor> {
        let inner = self.inner.lock();
        let start = match mode {
            CursorMode::FromTail => inner.tail.clone()?,
            CursorMode::FromRecent(k) => {
                let target_index = (inner.len.saturating_sub(1)).saturating_sub(k);
                let mut node = inner.head.clone()?;
                for _ in 0..target_index {
                    node = node.next().unwrap_or(node);
                }
                node
            }
        };
        Some(Cursor::new(start))
    }

    /// Advances `cursor` to the page following the one it currently holds.
    ///
    /// Returns `(cursor, true)` with the cursor unchanged when the tail has
    /// been reached - the caller should sleep briefly and retry rather than
    /// treat this as an error. The old page reference is released and the
    /// new one acquired atomically from the caller's perspective: there is
    /// no window where the cursor holds neither.
    #[must_use]
    pub fn advance(&self, cursor: Cursor) -> (Cursor, bool) {
        match cursor.page().next() {
            Some(next_page) => (Cursor::new(next_page), false),
            None => (cursor, true),
        }
    }

    /// Evicts unpinned pages from the head while the buffer exceeds its
    /// maximum, stopping at the first pinned page, once only one page
    /// remains, or once the minimum retention has been reached - in that
    /// precedence order.
    pub fn truncate(&self) {
        let mut inner = self.inner.lock();
        if inner.len <= self.max_pages {
            return;
        }
        loop {
            if inner.len <= 1 {
                break;
            }
            let Some(head) = inner.head.clone() else {
                break;
            };
            if head.ref_count() > 0 {
                break;
            }
            if inner.len <= self.min_pages {
                break;
            }
            let Some(next) = head.next() else {
                break;
            };
            inner.head = Some(next);
            inner.len -= 1;
            drop(inner);
            self.reclaim(head);
            inner = self.inner.lock();
        }
    }

    /// Returns a fully-evicted page's storage to the pool, if this call
    /// holds the last strong reference to it. A pinned page never reaches
    /// here (the truncate loop stops before evicting one), so in normal
    /// operation this always succeeds; a failed reclaim just skips the pool
    /// return rather than panicking.
    fn reclaim(&self, page: Arc<Page>) {
        match Arc::try_unwrap(page) {
            Ok(page) => self.pool.release(page.into_bytes()),
            Err(_) => {
                log::warn!("evicted page still has outstanding references, skipping pool return");
            }
        }
    }
}
