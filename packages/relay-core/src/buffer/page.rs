//! A single immutable-after-publish page of stream bytes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// An immutable-after-publish byte page with a reader-cursor refcount and a
/// link to the next page.
///
/// Pages are produced strictly in order. Once a page is linked as the
/// buffer's tail, its bytes and `next` pointer are never rewritten - `next`
/// is a [`OnceLock`] precisely so it can be set exactly once under the
/// buffer's structural mutex and then read lock-free by any cursor.
pub struct Page {
    data: Vec<u8>,
    seq: u64,
    refcount: AtomicUsize,
    next: OnceLock<Arc<Page>>,
}

impl Page {
    pub(crate) fn new(data: Vec<u8>, seq: u64) -> Self {
        Self {
            data,
            seq,
            refcount: AtomicUsize::new(0),
            next: OnceLock::new(),
        }
    }

    /// The page's bytes, truncated to however much the source actually sent.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Monotonic append sequence number, assigned by the owning `PageBuffer`.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Links `next` as the page following this one. Must be called at most
    /// once per page - subsequent calls are no-ops, since a page's next
    /// pointer is published exactly once.
    pub(crate) fn link_next(&self, next: Arc<Page>) {
        let _ = self.next.set(next);
    }

    /// Reads the next page, if linked. Lock-free: a successfully observed
    /// `Some` is guaranteed to point at a fully-populated page, since
    /// `OnceLock` publishes with release-acquire ordering.
    #[must_use]
    pub fn next(&self) -> Option<Arc<Page>> {
        self.next.get().cloned()
    }

    pub(crate) fn acquire_ref(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_ref(&self) {
        self.refcount.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// Consumes the page and reclaims its backing storage. Only called by
    /// `PageBuffer::reclaim` once a page has been evicted and is known to be
    /// unpinned.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// A per-listener reference into the `PageBuffer`, pinning the page it
/// currently points at.
///
/// Dropping a cursor releases its pin. This is deliberate: a listener
/// session that errors out, times out, or simply goes out of scope
/// automatically unblocks eviction with no explicit cleanup call required.
pub struct Cursor {
    page: Arc<Page>,
}

impl Cursor {
    pub(crate) fn new(page: Arc<Page>) -> Self {
        page.acquire_ref();
        Self { page }
    }

    /// The page this cursor currently pins.
    #[must_use]
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.page.release_ref();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_has_zero_refcount() {
        let page = Page::new(vec![1, 2, 3], 0);
        assert_eq!(page.ref_count(), 0);
    }

    #[test]
    fn cursor_pins_page_on_creation_and_unpins_on_drop() {
        let page = Arc::new(Page::new(vec![0u8; 4], 0));
        let cursor = Cursor::new(Arc::clone(&page));
        assert_eq!(page.ref_count(), 1);
        drop(cursor);
        assert_eq!(page.ref_count(), 0);
    }

    #[test]
    fn multiple_cursors_on_same_page_stack_refcount() {
        let page = Arc::new(Page::new(vec![0u8; 4], 0));
        let a = Cursor::new(Arc::clone(&page));
        let b = Cursor::new(Arc::clone(&page));
        assert_eq!(page.ref_count(), 2);
        drop(a);
        assert_eq!(page.ref_count(), 1);
        drop(b);
        assert_eq!(page.ref_count(), 0);
    }

    #[test]
    fn next_is_none_until_linked() {
        let page = Page::new(vec![0u8; 4], 0);
        assert!(page.next().is_none());
        let successor = Arc::new(Page::new(vec![1u8; 4], 1));
        page.link_next(Arc::clone(&successor));
        assert_eq!(page.next().unwrap().seq(), 1);
    }

    #[test]
    fn link_next_is_idempotent() {
        let page = Page::new(vec![0u8; 4], 0);
        let first = Arc::new(Page::new(vec![1u8; 4], 1));
        let second = Arc::new(Page::new(vec![2u8; 4], 2));
        page.link_next(Arc::clone(&first));
        page.link_next(Arc::clone(&second));
        assert_eq!(page.next().unwrap().seq(), 1);
    }
}
