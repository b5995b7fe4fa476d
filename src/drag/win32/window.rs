//! Main window discovery for attributing an injected drag.
//!
//! Tried in order: the foreground window if visible, a visible window
//! owned by the captured main thread (preferring a captioned, non-tool
//! window), then any visible top-level window.

use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowExW, GWL_EXSTYLE, GWL_STYLE, GetForegroundWindow, GetWindowLongW,
    GetWindowThreadProcessId, IsWindowVisible, WS_CAPTION, WS_EX_TOOLWINDOW,
};
use windows::core::{BOOL, PCWSTR};

use crate::drag::ExecutionContext;

struct ThreadWindows {
    thread_id: u32,
    best: HWND,
    fallback: HWND,
}

unsafe extern "system" fn collect_thread_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the &mut ThreadWindows passed to EnumWindows below,
    // alive for the whole enumeration.
    let found = unsafe { &mut *(lparam.0 as *mut ThreadWindows) };

    let owner_thread = unsafe { GetWindowThreadProcessId(hwnd, None) };
    if owner_thread != found.thread_id || !unsafe { IsWindowVisible(hwnd) }.as_bool() {
        return BOOL::from(true);
    }

    let style = unsafe { GetWindowLongW(hwnd, GWL_STYLE) } as u32;
    let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
    if (style & WS_CAPTION.0) == WS_CAPTION.0 && (ex_style & WS_EX_TOOLWINDOW.0) == 0 {
        found.best = hwnd;
        return BOOL::from(false);
    }
    if found.fallback.is_invalid() {
        found.fallback = hwnd;
    }
    BOOL::from(true)
}

fn window_of_thread(thread_id: u32) -> Option<HWND> {
    let mut found = ThreadWindows {
        thread_id,
        best: HWND::default(),
        fallback: HWND::default(),
    };
    // SAFETY: the callback only touches `found` through lparam during this call.
    // EnumWindows reports an error when the callback stops early; that is expected.
    let _ = unsafe {
        EnumWindows(
            Some(collect_thread_window),
            LPARAM(&mut found as *mut ThreadWindows as isize),
        )
    };

    [found.best, found.fallback]
        .into_iter()
        .find(|hwnd| !hwnd.is_invalid())
}

fn any_visible_top_level() -> Option<HWND> {
    // SAFETY: FindWindowExW with null filters walks the top-level z-order.
    unsafe {
        let mut hwnd = FindWindowExW(None, None, PCWSTR::null(), PCWSTR::null()).ok()?;
        while !hwnd.is_invalid() {
            if IsWindowVisible(hwnd).as_bool() {
                return Some(hwnd);
            }
            hwnd = FindWindowExW(None, Some(hwnd), PCWSTR::null(), PCWSTR::null()).ok()?;
        }
        None
    }
}

/// Pick the window the drag should appear to originate from.
pub fn find_main_window(context: Option<&ExecutionContext>) -> Option<HWND> {
    // SAFETY: no preconditions.
    let foreground = unsafe { GetForegroundWindow() };
    if !foreground.is_invalid() && unsafe { IsWindowVisible(foreground) }.as_bool() {
        tracing::debug!(hwnd = ?foreground.0, "using foreground window");
        return Some(foreground);
    }

    if let Some(ctx) = context {
        let thread_id = ctx.os_thread_id() as u32;
        if let Some(hwnd) = window_of_thread(thread_id) {
            tracing::debug!(hwnd = ?hwnd.0, thread_id, "using main thread window");
            return Some(hwnd);
        }
    }

    let hwnd = any_visible_top_level()?;
    tracing::debug!(hwnd = ?hwnd.0, "using first visible top-level window");
    Some(hwnd)
}
