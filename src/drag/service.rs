//! Drag session service — process-wide lifecycle around the backend.
//!
//! Constructed once at application startup and shared by reference
//! (usually behind an `Arc`) with whatever schedules drag requests.
//! Lifecycle calls are serialized; drag requests are not. Two racing
//! requests both reach the backend and the last writer to the OS drag
//! channel wins.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

use super::{DragBackend, DragError, DragRequest, ExecutionContext, PlatformBackend, ServiceState};

/// Tunables passed to the platform backend.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// X11 display name. `None` uses `$DISPLAY`.
    pub display: Option<String>,
    /// How long to let a forced focus change settle before the native
    /// drag session starts (Windows).
    pub settle_delay: Duration,
    /// Cancel a drop whose target window belongs to this process
    /// (Windows).
    pub reject_self_drop: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            display: None,
            settle_delay: Duration::from_millis(100),
            reject_self_drop: true,
        }
    }
}

/// Owns the native drag subsystem for the lifetime of the application.
///
/// States move `Uninitialized → Initialized → ShutDown` and never back.
/// Requests outside `Initialized` fail with
/// [`DragError::MechanismUnavailable`] instead of reaching the backend.
pub struct DragService<B: DragBackend = PlatformBackend> {
    backend: B,
    state: AtomicU8,
    /// Serializes initialize/cleanup against each other.
    lifecycle: Mutex<()>,
    main_thread: OnceLock<ExecutionContext>,
}

impl DragService<PlatformBackend> {
    /// Create a service around this platform's backend. Nothing native
    /// is touched until [`initialize`](Self::initialize).
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_backend(PlatformBackend::new(config))
    }
}

impl<B: DragBackend> DragService<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            state: AtomicU8::new(ServiceState::Uninitialized as u8),
            lifecycle: Mutex::new(()),
            main_thread: OnceLock::new(),
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start the native subsystem.
    ///
    /// Only valid once, from `Uninitialized`. A failure leaves the
    /// service uninitialized; the application keeps running with drag
    /// disabled.
    pub fn initialize(&self) -> Result<(), DragError> {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        match self.state() {
            ServiceState::Uninitialized => {}
            ServiceState::Initialized => {
                return Err(DragError::ServiceInitFailed("already initialized".into()));
            }
            ServiceState::ShutDown => {
                return Err(DragError::ServiceInitFailed(
                    "service has been shut down".into(),
                ));
            }
        }

        self.backend.initialize()?;
        self.state
            .store(ServiceState::Initialized as u8, Ordering::Release);
        tracing::info!("drag service initialized");
        Ok(())
    }

    /// Capture the calling thread as the application's main execution
    /// context and hand it to the backend.
    ///
    /// Call once, on the main thread, after [`initialize`](Self::initialize).
    /// The context is kept only if the backend accepts it; after a
    /// refusal the call may be retried.
    pub fn set_main_thread_info(&self) -> Result<(), DragError> {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state() != ServiceState::Initialized {
            return Err(DragError::ServiceInitFailed(
                "main thread info requires an initialized service".into(),
            ));
        }
        if self.main_thread.get().is_some() {
            return Err(DragError::ServiceInitFailed(
                "main thread info already captured".into(),
            ));
        }

        let context = ExecutionContext::current();
        self.backend.set_main_thread_info(&context)?;
        let context = self.main_thread.get_or_init(|| context);

        tracing::info!(
            os_thread_id = context.os_thread_id(),
            process_id = context.process_id(),
            thread = context.thread_name().unwrap_or("<unnamed>"),
            "main thread info set"
        );
        Ok(())
    }

    /// The captured main execution context, if any.
    pub fn main_thread(&self) -> Option<&ExecutionContext> {
        self.main_thread.get()
    }

    /// Validate `path` and force the OS into a drag of that file.
    ///
    /// Order: existence, availability, native takeover. Blocks for as
    /// long as the native call does; callers on an event loop should
    /// run this on a background unit.
    pub fn start_drag(&self, path: impl Into<PathBuf>) -> Result<(), DragError> {
        let request = DragRequest::new(path)?;
        self.start_request(&request)
    }

    /// [`start_drag`](Self::start_drag) for an already validated request.
    pub fn start_request(&self, request: &DragRequest) -> Result<(), DragError> {
        match self.state() {
            ServiceState::Initialized => {}
            ServiceState::Uninitialized => {
                return Err(DragError::MechanismUnavailable(
                    "drag service not initialized".into(),
                ));
            }
            ServiceState::ShutDown => {
                return Err(DragError::MechanismUnavailable(
                    "drag service shut down".into(),
                ));
            }
        }

        if !self.backend.is_available() {
            return Err(DragError::MechanismUnavailable(
                "windowing system is not running".into(),
            ));
        }

        tracing::debug!(
            request_id = %request.id(),
            path = %request.path().display(),
            "taking over drag"
        );

        self.backend.start_drag(request, self.main_thread.get())?;

        tracing::info!(
            request_id = %request.id(),
            path = %request.path().display(),
            "drag channel now holds file"
        );
        Ok(())
    }

    /// Whether a request made now could reach the native layer.
    /// False before initialization and after shutdown.
    pub fn is_available(&self) -> bool {
        self.state() == ServiceState::Initialized && self.backend.is_available()
    }

    /// Release the native subsystem. Terminal: later requests fail.
    ///
    /// Without a prior `initialize` only the state changes; a second
    /// call is a no-op.
    pub fn cleanup(&self) {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self
            .state
            .swap(ServiceState::ShutDown as u8, Ordering::AcqRel);
        match ServiceState::from_u8(previous) {
            ServiceState::Initialized => {
                self.backend.cleanup();
                tracing::info!("drag service shut down");
            }
            ServiceState::Uninitialized => {
                tracing::debug!("drag service cleaned up without initialization");
            }
            ServiceState::ShutDown => {}
        }
    }
}
