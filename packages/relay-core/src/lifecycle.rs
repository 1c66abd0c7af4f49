//! Application lifecycle abstraction.
//!
//! Provides a [`Lifecycle`] trait so the binary's hard process-exit points
//! (startup/bind failure) go through one seam instead of scattering
//! `std::process::exit` calls through `main`.

/// Trait for terminating the process with a given exit code.
pub trait Lifecycle: Send + Sync {
    /// Terminates the process with `exit_code`. Implementations that embed
    /// the server (tests, library consumers) may choose not to actually
    /// exit the process.
    fn request_shutdown(&self, exit_code: i32);
}

/// Lifecycle implementation for the standalone relay server binary.
pub struct ServerLifecycle;

impl Lifecycle for ServerLifecycle {
    fn request_shutdown(&self, exit_code: i32) {
        log::info!("terminating with exit code {exit_code}");
        std::process::exit(exit_code);
    }
}

/// No-op lifecycle for tests or embedded use: logs the request but leaves
/// the process running.
pub struct NoopLifecycle;

impl Lifecycle for NoopLifecycle {
    fn request_shutdown(&self, exit_code: i32) {
        log::debug!("shutdown requested (no-op), exit code {exit_code}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_lifecycle_does_not_exit_the_process() {
        NoopLifecycle.request_shutdown(1);
    }
}
