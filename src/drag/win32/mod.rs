//! Windows backend — programmatic OLE drag session injection.
//!
//! `DoDragDrop` normally runs inside a mouse-down handler on the UI
//! thread. Here it runs on the request's background thread instead: the
//! thread initializes OLE, attaches its input queue to the main window's
//! thread so the session is attributed to the application, forces that
//! window to the foreground, and then runs a modal drag loop for a shell
//! data object describing the file.

mod source;
mod window;

use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use windows::Win32::Foundation::{DRAGDROP_S_CANCEL, HWND};
use windows::Win32::System::Com::{CoTaskMemFree, IDataObject};
use windows::Win32::System::Ole::{
    DROPEFFECT_COPY, DROPEFFECT_MOVE, DROPEFFECT_NONE, DoDragDrop, OleInitialize,
    OleUninitialize,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{SetActiveWindow, SetFocus};
use windows::Win32::UI::Shell::Common::ITEMIDLIST;
use windows::Win32::UI::Shell::{
    BHID_DataObject, IShellItem, SHCreateItemFromIDList, SHParseDisplayName,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AttachThreadInput, GetDesktopWindow, GetWindowThreadProcessId, SetForegroundWindow,
};
use windows::core::PCWSTR;

use crate::drag::{DragBackend, DragError, DragRequest, ExecutionContext, ServiceConfig};

/// OLE initialized on the current thread until dropped.
struct OleScope;

impl OleScope {
    fn enter() -> Result<Self, DragError> {
        // SAFETY: paired with OleUninitialize in Drop on the same thread.
        unsafe { OleInitialize(None) }
            .map_err(|e| DragError::NativeTakeoverFailed(format!("OleInitialize: {e}")))?;
        Ok(Self)
    }
}

impl Drop for OleScope {
    fn drop(&mut self) {
        // SAFETY: OleInitialize succeeded on this thread.
        unsafe { OleUninitialize() };
    }
}

/// Input queue of the current thread attached to another thread's.
struct InputAttachment {
    from: u32,
    to: u32,
}

impl InputAttachment {
    fn attach(hwnd: HWND) -> Option<Self> {
        // SAFETY: plain thread id queries.
        let (from, to) = unsafe { (GetCurrentThreadId(), GetWindowThreadProcessId(hwnd, None)) };
        if to == 0 || to == from {
            return None;
        }
        // SAFETY: both ids name live threads.
        if unsafe { AttachThreadInput(from, to, true) }.as_bool() {
            tracing::debug!(from, to, "attached thread input");
            Some(Self { from, to })
        } else {
            tracing::warn!(from, to, "AttachThreadInput failed, continuing unattached");
            None
        }
    }
}

impl Drop for InputAttachment {
    fn drop(&mut self) {
        // SAFETY: undoes the attachment made in `attach`.
        let _ = unsafe { AttachThreadInput(self.from, self.to, false) };
    }
}

/// Full-featured shell `IDataObject` for a file (CF_HDROP, shell id
/// lists, file contents), as Explorer would produce.
fn shell_data_object(path: &Path) -> Result<IDataObject, DragError> {
    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    // SAFETY: `wide` is NUL-terminated and outlives the call; the id list
    // is freed with CoTaskMemFree once the shell item holds its own copy.
    unsafe {
        let mut pidl: *mut ITEMIDLIST = std::ptr::null_mut();
        SHParseDisplayName(PCWSTR(wide.as_ptr()), None, &mut pidl, 0, None)
            .map_err(|e| DragError::NativeTakeoverFailed(format!("SHParseDisplayName: {e}")))?;

        let item: windows::core::Result<IShellItem> = SHCreateItemFromIDList(pidl);
        CoTaskMemFree(Some(pidl as *const _));
        let item = item.map_err(|e| {
            DragError::NativeTakeoverFailed(format!("SHCreateItemFromIDList: {e}"))
        })?;

        item.BindToHandler(None, &BHID_DataObject)
            .map_err(|e| DragError::NativeTakeoverFailed(format!("BindToHandler: {e}")))
    }
}

fn bring_to_front(hwnd: HWND) {
    // SAFETY: hwnd came from the window search; failures only mean the
    // focus change was refused.
    unsafe {
        let _ = SetForegroundWindow(hwnd);
        let _ = SetActiveWindow(hwnd);
        let _ = SetFocus(Some(hwnd));
    }
}

/// Windows implementation of [`DragBackend`].
pub struct WindowsBackend {
    settle_delay: Duration,
    reject_self_drop: bool,
}

impl WindowsBackend {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            reject_self_drop: config.reject_self_drop,
        }
    }
}

impl DragBackend for WindowsBackend {
    fn initialize(&self) -> Result<(), DragError> {
        // OLE is per thread; each request enters it on its own thread.
        Ok(())
    }

    fn set_main_thread_info(&self, context: &ExecutionContext) -> Result<(), DragError> {
        tracing::debug!(
            thread_id = context.os_thread_id(),
            process_id = context.process_id(),
            "main thread recorded for drag attribution"
        );
        Ok(())
    }

    fn start_drag(
        &self,
        request: &DragRequest,
        context: Option<&ExecutionContext>,
    ) -> Result<(), DragError> {
        let _ole = OleScope::enter()?;

        let hwnd = window::find_main_window(context).ok_or_else(|| {
            DragError::NativeTakeoverFailed("no visible application window".into())
        })?;
        let _attachment = InputAttachment::attach(hwnd);

        let data_object = shell_data_object(request.path())?;
        let drop_source = source::DropSource::new(self.reject_self_drop);

        bring_to_front(hwnd);
        std::thread::sleep(self.settle_delay);

        let mut effect = DROPEFFECT_NONE;
        // SAFETY: both COM objects live until the modal loop returns.
        let hr = unsafe {
            DoDragDrop(
                &data_object,
                &drop_source,
                DROPEFFECT_COPY | DROPEFFECT_MOVE,
                &mut effect,
            )
        };
        tracing::debug!(
            request_id = %request.id(),
            hresult = format_args!("0x{:08x}", hr.0),
            effect = effect.0,
            "DoDragDrop returned"
        );

        if hr.is_err() {
            return Err(DragError::NativeTakeoverFailed(format!(
                "DoDragDrop failed: {}",
                windows::core::Error::from(hr)
            )));
        }
        if hr == DRAGDROP_S_CANCEL {
            return Err(DragError::NativeTakeoverFailed("drag cancelled".into()));
        }
        if effect == DROPEFFECT_NONE {
            return Err(DragError::NativeTakeoverFailed(
                "dropped on a target that accepted nothing".into(),
            ));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        // SAFETY: no preconditions.
        !unsafe { GetDesktopWindow() }.is_invalid()
    }

    fn cleanup(&self) {}
}
