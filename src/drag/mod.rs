//! Native drag takeover — service lifecycle, request validation, and
//! the per-OS backend that forces a file into the OS drag channel.
//!
//! The triggering event arrives from a web view after the native
//! mouse-down has already been consumed, so the usual synchronous drag
//! APIs cannot be used. Each backend works around that differently:
//!
//! - X11: own the `XdndSelection` selection and serve the file URI to
//!   whichever drop target asks for it.
//! - macOS: write a file URL onto the `NSDragPboard` pasteboard.
//! - Windows: run an OLE drag session on a background thread attached
//!   to the input queue of the application's main window.
//!
//! Only one backend is compiled per target; [`PlatformBackend`] names it.

pub mod context;
pub mod request;
pub mod service;
#[cfg(test)]
pub(crate) mod testing;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod unsupported;
#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "linux")]
pub mod x11;

use std::path::PathBuf;

pub use context::ExecutionContext;
pub use request::DragRequest;
pub use service::{DragService, ServiceConfig};

#[cfg(target_os = "macos")]
pub use macos::MacBackend as PlatformBackend;
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub use unsupported::UnsupportedBackend as PlatformBackend;
#[cfg(target_os = "windows")]
pub use win32::WindowsBackend as PlatformBackend;
#[cfg(target_os = "linux")]
pub use x11::X11Backend as PlatformBackend;

/// Errors returned by the drag service and its backends.
///
/// Every variant means the same thing to the caller: report it and let
/// the user re-initiate the gesture. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum DragError {
    /// The file did not exist when the request was made.
    #[error("file not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The path was not absolute. Callers resolve paths before
    /// handing them to the service.
    #[error("path is not absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    /// The windowing/drag subsystem is not servicing requests (service
    /// not initialized, already shut down, or display gone).
    #[error("drag mechanism unavailable: {0}")]
    MechanismUnavailable(String),

    /// The platform call ran but refused or failed.
    #[error("native drag takeover failed: {0}")]
    NativeTakeoverFailed(String),

    /// `initialize` or `set_main_thread_info` could not complete.
    #[error("drag service init failed: {0}")]
    ServiceInitFailed(String),
}

impl DragError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound(_) => "path_not_found",
            Self::NotAbsolute(_) => "not_absolute",
            Self::MechanismUnavailable(_) => "mechanism_unavailable",
            Self::NativeTakeoverFailed(_) => "native_takeover_failed",
            Self::ServiceInitFailed(_) => "service_init_failed",
        }
    }
}

/// Lifecycle state of a [`DragService`].
///
/// Transitions are monotonic: `Uninitialized → Initialized → ShutDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Uninitialized = 0,
    Initialized = 1,
    ShutDown = 2,
}

impl ServiceState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            _ => Self::ShutDown,
        }
    }
}

/// Platform drag mechanism.
///
/// Implementations are driven by [`DragService`], which enforces the
/// lifecycle ordering and request validation; a backend only performs
/// the native work. `Send + Sync` because each request runs on its own
/// background thread.
pub trait DragBackend: Send + Sync {
    /// Start whatever native subsystem `start_drag` depends on.
    fn initialize(&self) -> Result<(), DragError>;

    /// Record the main thread's identity for later requests arriving on
    /// other threads. Backends without that constraint accept and ignore it.
    fn set_main_thread_info(&self, context: &ExecutionContext) -> Result<(), DragError>;

    /// Put the request's file into the OS drag channel.
    ///
    /// `context` is `None` when `set_main_thread_info` was never called.
    fn start_drag(
        &self,
        request: &DragRequest,
        context: Option<&ExecutionContext>,
    ) -> Result<(), DragError>;

    /// Whether the native subsystem can accept a request right now.
    /// Must not block for long and must not mutate OS state.
    fn is_available(&self) -> bool;

    /// Release everything `initialize` started.
    fn cleanup(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_distinct() {
        let errors = [
            DragError::PathNotFound("/a".into()),
            DragError::NotAbsolute("a".into()),
            DragError::MechanismUnavailable("x".into()),
            DragError::NativeTakeoverFailed("x".into()),
            DragError::ServiceInitFailed("x".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(DragError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn path_not_found_message_names_the_file() {
        let err = DragError::PathNotFound("/tmp/missing.pdf".into());
        assert_eq!(err.to_string(), "file not found: /tmp/missing.pdf");
    }

    #[test]
    fn state_from_raw() {
        assert_eq!(ServiceState::from_u8(0), ServiceState::Uninitialized);
        assert_eq!(ServiceState::from_u8(1), ServiceState::Initialized);
        assert_eq!(ServiceState::from_u8(2), ServiceState::ShutDown);
    }
}
