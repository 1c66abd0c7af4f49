//! Shoutcast/ICY inline metadata framing.
//!
//! A metadata frame is one length byte `L` (0 if the title hasn't changed
//! since the last frame this listener received, else `ceil(payload_len/16)`),
//! followed by `L * 16` bytes of payload: the title formatted as
//! `StreamTitle='...';`, NUL-padded to the block boundary. The 16-byte
//! quantization is a wire-compatibility requirement, not a tunable.

use crate::protocol_constants::ICY_META_BLOCK_SIZE;

/// Per-listener metadata frame scheduler.
///
/// Tracks the last title this particular listener was sent, so a frame only
/// carries a payload when the mount's current title has actually changed
/// since this listener's last frame - other listeners joining at different
/// times may see the change on a different frame boundary.
pub struct MetaFramer {
    last_title_sent: String,
}

impl MetaFramer {
    /// Creates a framer that has not yet sent any title - equivalent to
    /// having last seen an empty title, so a mount that never sets one
    /// produces all-zero frames indefinitely.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_title_sent: String::new(),
        }
    }

    /// Builds the next metadata frame for `current_title`.
    ///
    /// Returns a single zero byte if `current_title` matches what this
    /// listener was last sent; otherwise returns a full frame and records
    /// `current_title` as sent.
    pub fn next_frame(&mut self, current_title: &str) -> Vec<u8> {
        if current_title == self.last_title_sent {
            return vec![0];
        }
        self.last_title_sent = current_title.to_string();
        Self::format_title(current_title)
    }

    fn format_title(title: &str) -> Vec<u8> {
        // ICY metadata uses single quotes as delimiters; escape by
        // substituting the visually-identical Unicode right single
        // quotation mark rather than backslash-escaping, which some
        // clients render literally.
        let title = title.replace('\'', "\u{2019}");
        let meta_str = format!("StreamTitle='{}';", title);
        let meta_bytes = meta_str.as_bytes();

        let num_blocks = meta_bytes.len().div_ceil(ICY_META_BLOCK_SIZE);
        let padded_len = num_blocks * ICY_META_BLOCK_SIZE;

        let mut result = Vec::with_capacity(padded_len + 1);
        result.push(num_blocks as u8);
        result.extend_from_slice(meta_bytes);
        result.resize(padded_len + 1, 0);
        result
    }
}

impl Default for MetaFramer {
    fn default() -> Self {
        Self::new()
    }
}
