//! In-memory backend for exercising the service and host shell.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{DragBackend, DragError, DragRequest, ExecutionContext};

/// Records every call and keeps the "drag channel" in a mutex.
pub struct RecordingBackend {
    pub init_calls: AtomicUsize,
    pub main_thread_calls: AtomicUsize,
    pub drag_calls: AtomicUsize,
    pub cleanup_calls: AtomicUsize,
    pub available: AtomicBool,
    pub reject: AtomicBool,
    /// Refuse the next `set_main_thread_info`, then accept again.
    pub refuse_main_thread: AtomicBool,
    fail_init: bool,
    channel: Mutex<Option<PathBuf>>,
    /// OS thread id of the context passed with the most recent request.
    pub last_context: Mutex<Option<u64>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            init_calls: AtomicUsize::new(0),
            main_thread_calls: AtomicUsize::new(0),
            drag_calls: AtomicUsize::new(0),
            cleanup_calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            reject: AtomicBool::new(false),
            refuse_main_thread: AtomicBool::new(false),
            fail_init: false,
            channel: Mutex::new(None),
            last_context: Mutex::new(None),
        }
    }
}

impl RecordingBackend {
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn channel(&self) -> Option<PathBuf> {
        self.channel.lock().unwrap().clone()
    }
}

impl DragBackend for RecordingBackend {
    fn initialize(&self) -> Result<(), DragError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(DragError::ServiceInitFailed("backend refused to start".into()));
        }
        Ok(())
    }

    fn set_main_thread_info(&self, _context: &ExecutionContext) -> Result<(), DragError> {
        self.main_thread_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_main_thread.swap(false, Ordering::SeqCst) {
            return Err(DragError::ServiceInitFailed("main thread refused".into()));
        }
        Ok(())
    }

    fn start_drag(
        &self,
        request: &DragRequest,
        context: Option<&ExecutionContext>,
    ) -> Result<(), DragError> {
        self.drag_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock().unwrap() = context.map(ExecutionContext::os_thread_id);
        if self.reject.load(Ordering::SeqCst) {
            return Err(DragError::NativeTakeoverFailed("rejected".into()));
        }
        *self.channel.lock().unwrap() = Some(request.path().to_path_buf());
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
}
