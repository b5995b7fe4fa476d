//! Host-shell boundary — what the desktop application calls.
//!
//! The shell calls [`App::startup`] once its window and event system
//! are up and [`App::shutdown`] when it closes. Drags arrive either as
//! web events (`start-drag` with the path as first datum), which are
//! scheduled on a blocking background task and only logged, or through
//! [`App::start_drag`], which runs inline and returns a readable error.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::drag::{DragBackend, DragError, DragService, PlatformBackend, ServiceConfig};

/// Event name the web layer emits when it detects drag intent.
pub const START_DRAG_EVENT: &str = "start-drag";

/// An event from the web layer: a name plus optional data values.
#[derive(Debug, Clone, Deserialize)]
pub struct WebEvent {
    pub name: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// The application's handle on the drag subsystem.
pub struct App<B: DragBackend = PlatformBackend> {
    drag: Arc<DragService<B>>,
}

impl App<PlatformBackend> {
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_service(Arc::new(DragService::new(config)))
    }
}

impl<B: DragBackend + 'static> App<B> {
    pub fn with_service(drag: Arc<DragService<B>>) -> Self {
        Self { drag }
    }

    pub fn service(&self) -> &Arc<DragService<B>> {
        &self.drag
    }

    /// Lifecycle hook: initialize the drag service, then capture the
    /// calling thread as the main thread. Call on the main thread.
    ///
    /// A failure is logged and returned; the application keeps running
    /// with drag disabled.
    pub fn startup(&self) -> Result<(), DragError> {
        tracing::info!("initializing drag service");
        if let Err(e) = self.drag.initialize() {
            tracing::error!(error = %e, "failed to initialize drag service");
            return Err(e);
        }

        if let Err(e) = self.drag.set_main_thread_info() {
            tracing::error!(error = %e, "failed to set main thread info");
            return Err(e);
        }

        tracing::info!("drag service ready");
        Ok(())
    }

    /// Lifecycle hook: release the drag service.
    pub fn shutdown(&self) {
        self.drag.cleanup();
    }

    /// Direct drag entry point for the UI binding layer.
    ///
    /// Resolves `file_path` against the current directory and runs the
    /// takeover on the calling thread.
    pub fn start_drag(&self, file_path: &str) -> Result<(), String> {
        let path = resolve(file_path).map_err(|e| format!("failed to get absolute path: {e}"))?;
        tracing::info!(path = %path.display(), "starting file drag");

        self.drag.start_drag(path).map_err(|e| {
            tracing::warn!(kind = e.kind(), error = %e, "drag failed");
            e.to_string()
        })
    }

    /// Route a web event. Returns the background task for a scheduled
    /// drag, `None` when the event was ignored.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn dispatch(&self, event: &WebEvent) -> Option<JoinHandle<Result<(), DragError>>> {
        if event.name != START_DRAG_EVENT {
            tracing::trace!(name = %event.name, "ignoring web event");
            return None;
        }
        self.on_start_drag(&event.data)
    }

    /// Handle a `start-drag` event. Anything but a string first datum
    /// is a no-op.
    pub fn on_start_drag(
        &self,
        data: &[serde_json::Value],
    ) -> Option<JoinHandle<Result<(), DragError>>> {
        let file_path = data.first()?.as_str()?;
        tracing::info!(path = file_path, "web drag triggered");

        let path = match resolve(file_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(path = file_path, error = %e, "failed to get absolute path");
                return None;
            }
        };

        let drag = Arc::clone(&self.drag);
        Some(tokio::task::spawn_blocking(move || {
            let result = drag.start_drag(path);
            match &result {
                Ok(()) => tracing::info!("drag completed"),
                Err(e) => tracing::error!(kind = e.kind(), error = %e, "drag failed"),
            }
            result
        }))
    }
}

fn resolve(file_path: &str) -> std::io::Result<PathBuf> {
    std::path::absolute(file_path)
}
