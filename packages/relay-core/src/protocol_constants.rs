//! Fixed protocol constants and documented defaults for tunables.
//!
//! Values here fall into two groups: true protocol constants (the ICY
//! metadata block quantum) that must never change, and sensible defaults for
//! values the external configuration layer is expected to override per
//! mount.

/// ICY/Shoutcast metadata block size quantum, in bytes.
///
/// Metadata frame payloads are always padded to a multiple of this many
/// bytes. This is a wire format constant, not a tunable.
pub const ICY_META_BLOCK_SIZE: usize = 16;

/// Default page capacity in bytes, if not overridden per mount.
pub const DEFAULT_PAGE_CAPACITY: usize = 4096;

/// Default number of pages to warm a joining listener with via `FromRecent`.
pub const DEFAULT_WARMUP_PAGES: usize = 10;

/// Default hard maximum page count before `Truncate` starts evicting.
pub const DEFAULT_BUFFER_MAX_PAGES: usize = 256;

/// Default soft minimum page count `Truncate` will not evict below.
pub const DEFAULT_BUFFER_MIN_PAGES: usize = 32;

/// Default metadata insertion interval in bytes (0 disables metadata).
///
/// 16,000 bytes matches the interval most Shoutcast/Icecast clients expect.
pub const DEFAULT_META_INT_BYTES: usize = 16_000;

/// Default interval between listener main-loop poll attempts when the
/// cursor has caught up to the tail and no new page is available yet.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Default idle timeout for a source that stops sending bytes mid-stream.
pub const DEFAULT_SOURCE_IDLE_MS: u64 = 10_000;

/// Default timeout for a source that never sends a first byte.
pub const DEFAULT_EMPTY_BUFFER_IDLE_MS: u64 = 10_000;

/// Default write deadline for a listener connection.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;

/// Grace period granted to a cancelled session to release its cursor,
/// expressed as a multiple of `WriteTimeout`.
pub const CANCEL_GRACE_WRITE_TIMEOUT_MULTIPLE: u32 = 2;

/// Server identification string sent in the `Server` response header.
pub const SERVER_ID: &str = concat!("relay-core/", env!("CARGO_PKG_VERSION"));

/// Maximum size of a single request-line or header line the wire layer will
/// read before giving up with `InvalidRequest` - bounds memory use from a
/// client that never sends a terminating CRLF.
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

/// Maximum number of header lines accepted per request.
pub const MAX_HEADER_LINES: usize = 64;
