//! Execution context — the identity of the thread that owns the
//! application's message loop.
//!
//! Captured once on the main thread by `DragService::set_main_thread_info`
//! and handed explicitly to the backend on every request, so a drag
//! arriving on a background thread can still be attributed to the UI
//! thread.

use std::thread::ThreadId;

/// Opaque identity of the application's main execution context.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    thread: ThreadId,
    thread_name: Option<String>,
    os_thread_id: u64,
    process_id: u32,
}

impl ExecutionContext {
    /// Capture the calling thread's identity.
    pub fn current() -> Self {
        let thread = std::thread::current();
        Self {
            thread: thread.id(),
            thread_name: thread.name().map(str::to_owned),
            os_thread_id: os_thread_id(),
            process_id: std::process::id(),
        }
    }

    /// Whether the calling thread is the captured one.
    pub fn is_current_thread(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Kernel-level thread id (`gettid`, `GetCurrentThreadId`,
    /// `pthread_threadid_np`).
    pub fn os_thread_id(&self) -> u64 {
        self.os_thread_id
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }
}

#[cfg(target_os = "linux")]
fn os_thread_id() -> u64 {
    nix::unistd::gettid().as_raw() as u64
}

#[cfg(target_os = "macos")]
fn os_thread_id() -> u64 {
    let mut tid: u64 = 0;
    // SAFETY: a null pthread_t selects the calling thread; tid is a valid out pointer.
    unsafe {
        nix::libc::pthread_threadid_np(std::ptr::null_mut(), &mut tid);
    }
    tid
}

#[cfg(target_os = "windows")]
fn os_thread_id() -> u64 {
    // SAFETY: no preconditions.
    u64::from(unsafe { windows::Win32::System::Threading::GetCurrentThreadId() })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn os_thread_id() -> u64 {
    0
}
