//! relay-core - shared library for the Icecast-compatible stream relay.
//!
//! This crate implements the CORE of an audio streaming relay: one live
//! producer per named mount point, fanned out to many concurrent listeners
//! over HTTP, with optional Shoutcast-style inline metadata.
//!
//! # Architecture
//!
//! - [`pool`]: reusable fixed-capacity page storage ([`pool::BytePool`]).
//! - [`buffer`]: the append-only, refcount-pinned page sequence
//!   ([`buffer::PageBuffer`]) every mount streams through.
//! - [`mount`]: per-mount controller mediating registration, credentials,
//!   and buffer lifecycle ([`mount::Mount`]).
//! - [`source`]: the source ingest state machine ([`source::SourceSession`]).
//! - [`listener`]: the per-listener pacing and catch-up loop
//!   ([`listener::ListenerSession`]).
//! - [`meta`]: Shoutcast/ICY inline metadata framing ([`meta::MetaFramer`]).
//! - [`registry`]: the process-wide table of configured mounts
//!   ([`registry::MountRegistry`]).
//! - [`state`]: materialized configuration types ([`state::RelayConfig`],
//!   [`state::MountConfig`]).
//! - [`error`]: centralized error types ([`error::RelayError`]).
//! - [`lifecycle`]: process-shutdown abstraction, decoupled from the
//!   binary's own `std::process::exit` calls.
//! - [`api`]: the HTTP wire protocol - source ingest, listener delivery,
//!   and the admin metadata endpoint - built directly on raw connections
//!   rather than a request/response framework (see `DESIGN.md`).

#![warn(clippy::all)]

pub mod api;
pub mod buffer;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod meta;
pub mod mount;
pub mod pool;
pub mod protocol_constants;
pub mod registry;
pub mod source;
pub mod state;

pub use api::{start_server, AppState, ServerError};
pub use buffer::{Cursor, CursorMode, Page, PageBuffer};
pub use error::{ErrorCode, RelayError, RelayResult};
pub use listener::ListenerSession;
pub use lifecycle::{Lifecycle, NoopLifecycle, ServerLifecycle};
pub use meta::MetaFramer;
pub use mount::{Credentials, Mount};
pub use pool::BytePool;
pub use registry::MountRegistry;
pub use source::SourceSession;
pub use state::{MountConfig, RelayConfig};
