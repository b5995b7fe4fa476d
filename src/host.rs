//! Minimal application shell around [`App`] for the `dragout` binary.
//!
//! Calls the lifecycle hooks in order on the main thread and feeds drag
//! requests either from the command line or from web events on stdin.

use std::time::Duration;

use dragout::{App, DragBackend, DragError, WebEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Binary-level errors.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0}")]
    Drag(#[from] DragError),
    #[error("drag failed: {0}")]
    Rejected(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
    }
}

/// One-shot drag: startup, take over, hold the channel, shutdown.
pub async fn run_drag<B: DragBackend + 'static>(
    app: &App<B>,
    path: &str,
    hold: Duration,
) -> Result<(), HostError> {
    if let Err(e) = app.startup() {
        // Initialization may have succeeded before the failing step.
        app.shutdown();
        return Err(e.into());
    }

    if let Err(e) = app.start_drag(path) {
        app.shutdown();
        return Err(HostError::Rejected(e));
    }

    // Selection-based channels disappear with their owner; keep serving.
    tracing::info!(seconds = hold.as_secs(), "holding drag channel");
    tokio::select! {
        _ = tokio::time::sleep(hold) => {}
        sig = shutdown_signal() => {
            let sig = sig?;
            tracing::info!(signal = sig, "shutting down");
        }
    }

    app.shutdown();
    Ok(())
}

/// Serve web events from stdin until EOF or a shutdown signal.
///
/// Startup failure is logged and serving continues with drag disabled,
/// the way a real application keeps running.
pub async fn serve(app: &App) -> Result<(), HostError> {
    if let Err(e) = app.startup() {
        eprintln!("dragout serve: drag disabled: {e}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::debug!("stdin closed");
                        break Ok(());
                    }
                    Err(e) => break Err(HostError::Io(e)),
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WebEvent>(&line) {
                    // Fire and forget; the task logs its own outcome.
                    Ok(event) => drop(app.dispatch(&event)),
                    Err(e) => tracing::warn!(error = %e, "ignoring malformed event"),
                }
            }
            sig = &mut shutdown => {
                match sig {
                    Ok(name) => tracing::info!(signal = name, "shutting down"),
                    Err(e) => tracing::warn!(error = %e, "signal handler failed, shutting down"),
                }
                break Ok(());
            }
        }
    };

    app.shutdown();
    result
}

/// Print availability across the lifecycle.
pub fn check(app: &App) -> Result<(), HostError> {
    println!("before startup: available={}", app.service().is_available());
    let started = app.startup();
    println!("after startup:  available={}", app.service().is_available());
    app.shutdown();
    println!("after shutdown: available={}", app.service().is_available());
    started.map_err(HostError::from)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dragout::DragService;
    use dragout::drag::ExecutionContext;
    use dragout::{DragRequest, ServiceState};

    use super::*;

    /// Starts fine but refuses the main thread, like a backend whose
    /// message loop is not up yet.
    #[derive(Default)]
    struct NoMainThread {
        cleanups: AtomicUsize,
    }

    impl DragBackend for NoMainThread {
        fn initialize(&self) -> Result<(), DragError> {
            Ok(())
        }

        fn set_main_thread_info(&self, _context: &ExecutionContext) -> Result<(), DragError> {
            Err(DragError::ServiceInitFailed("no message loop".into()))
        }

        fn start_drag(
            &self,
            _request: &DragRequest,
            _context: Option<&ExecutionContext>,
        ) -> Result<(), DragError> {
            Ok(())
        }

        fn is_available(&self) -> bool {
            true
        }

        fn cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn run_drag_releases_service_when_startup_fails_halfway() {
        let app = App::with_service(Arc::new(DragService::with_backend(
            NoMainThread::default(),
        )));

        let err = run_drag(&app, "/tmp/report.pdf", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Drag(DragError::ServiceInitFailed(_))));
        assert_eq!(app.service().state(), ServiceState::ShutDown);
        assert_eq!(app.service().backend().cleanups.load(Ordering::SeqCst), 1);
    }
}
