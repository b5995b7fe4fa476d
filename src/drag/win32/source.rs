//! `IDropSource` for injected drag sessions.

use windows::Win32::Foundation::{
    DRAGDROP_S_CANCEL, DRAGDROP_S_DROP, DRAGDROP_S_USEDEFAULTCURSORS, POINT, S_OK,
};
use windows::Win32::System::Ole::{DROPEFFECT, IDropSource, IDropSource_Impl};
use windows::Win32::System::SystemServices::{MK_LBUTTON, MODIFIERKEYS_FLAGS};
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    GW_OWNER, GetCursorPos, GetParent, GetWindow, GetWindowThreadProcessId, WindowFromPoint,
};
use windows::core::{BOOL, HRESULT, implement};

/// Drops on left-button release, cancels on Escape.
///
/// With `reject_self_drop`, a release over any window in this process's
/// window hierarchy cancels instead, so the web view never receives its
/// own file back.
#[implement(IDropSource)]
pub struct DropSource {
    reject_self_drop: bool,
}

impl DropSource {
    pub fn new(reject_self_drop: bool) -> IDropSource {
        Self { reject_self_drop }.into()
    }
}

impl IDropSource_Impl for DropSource_Impl {
    fn QueryContinueDrag(&self, fescapepressed: BOOL, grfkeystate: MODIFIERKEYS_FLAGS) -> HRESULT {
        if fescapepressed.as_bool() {
            tracing::debug!("drag cancelled with Escape");
            return DRAGDROP_S_CANCEL;
        }

        if (grfkeystate.0 & MK_LBUTTON.0) != 0 {
            return S_OK;
        }

        if self.reject_self_drop && cursor_over_own_window() {
            tracing::info!("drop target belongs to this process, cancelling");
            return DRAGDROP_S_CANCEL;
        }
        DRAGDROP_S_DROP
    }

    fn GiveFeedback(&self, _dweffect: DROPEFFECT) -> HRESULT {
        DRAGDROP_S_USEDEFAULTCURSORS
    }
}

/// Walk parents and owners of the window under the cursor looking for
/// one created by this process.
fn cursor_over_own_window() -> bool {
    // SAFETY: plain Win32 queries on window handles obtained from the system.
    unsafe {
        let mut pt = POINT::default();
        if GetCursorPos(&mut pt).is_err() {
            return false;
        }

        let self_pid = GetCurrentProcessId();
        let mut hwnd = WindowFromPoint(pt);

        while !hwnd.is_invalid() {
            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            if pid == self_pid {
                return true;
            }
            hwnd = match GetParent(hwnd) {
                Ok(parent) if !parent.is_invalid() => parent,
                _ => GetWindow(hwnd, GW_OWNER).unwrap_or_default(),
            };
        }
        false
    }
}
