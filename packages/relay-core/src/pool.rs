//! Reusable fixed-size byte-page allocator feeding [`PageBuffer`](crate::buffer::PageBuffer).
//!
//! Amortizes allocation for page storage: buffers released back to the pool
//! are handed out again on the next `acquire` rather than freed. Buffers
//! returned to the pool may carry arbitrary leftover contents - zeroing is
//! not required since pages always record their own actual length.

use parking_lot::Mutex;

/// A reusable, fixed-capacity byte buffer.
pub type PoolBuffer = Vec<u8>;

/// Lock-guarded free list of page-sized buffers.
pub struct BytePool {
    capacity: usize,
    free: Mutex<Vec<PoolBuffer>>,
}

impl BytePool {
    /// Creates a pool whose buffers all have the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Returns the page capacity this pool was constructed with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquires a writable buffer of this pool's capacity.
    ///
    /// Always succeeds: reuses a released buffer if one is free, otherwise
    /// allocates a new one.
    #[must_use]
    pub fn acquire(&self) -> PoolBuffer {
        let mut free = self.free.lock();
        match free.pop() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::with_capacity(self.capacity),
        }
    }

    /// Returns a buffer to the pool for reuse.
    ///
    /// Buffers whose capacity no longer matches the pool (shouldn't happen in
    /// normal operation, but cheap to guard against) are dropped instead of
    /// pooled.
    pub fn release(&self, buffer: PoolBuffer) {
        if buffer.capacity() < self.capacity {
            return;
        }
        self.free.lock().push(buffer);
    }

    /// Number of buffers currently sitting idle in the free list.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_empty_buffer_with_capacity() {
        let pool = BytePool::new(4096);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 4096);
    }

    #[test]
    fn release_then_acquire_reuses_storage() {
        let pool = BytePool::new(4096);
        let buf = pool.acquire();
        let ptr_before = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);

        let buf2 = pool.acquire();
        assert_eq!(buf2.as_ptr(), ptr_before);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn released_buffers_carry_arbitrary_contents_but_report_zero_len() {
        let pool = BytePool::new(16);
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"stale data here!");
        pool.release(buf);

        let reused = pool.acquire();
        assert_eq!(reused.len(), 0);
    }

    #[test]
    fn undersized_buffer_is_not_pooled() {
        let pool = BytePool::new(4096);
        pool.release(Vec::with_capacity(16));
        assert_eq!(pool.idle_count(), 0);
    }
}
