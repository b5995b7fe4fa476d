//! macOS backend — drag takeover through the drag pasteboard.
//!
//! AppKit drop targets read the dragged items from the pasteboard named
//! `NSPasteboardNameDrag` when the drop lands, no matter how the drag
//! session started. Writing a file URL there makes the drag that the
//! web view began carry our file. Pasteboard writes are not tied to the
//! main thread, so there is nothing to start, capture or stop.

use objc2::rc::{Retained, autoreleasepool};
use objc2::runtime::{AnyObject, Bool};
use objc2::{class, msg_send};
use objc2_app_kit::NSPasteboardNameDrag;
use objc2_foundation::{NSArray, NSString, NSURL};

use crate::drag::{DragBackend, DragError, DragRequest, ExecutionContext, ServiceConfig};

/// macOS implementation of [`DragBackend`].
pub struct MacBackend;

impl MacBackend {
    pub fn new(_config: &ServiceConfig) -> Self {
        Self
    }
}

fn write_drag_pasteboard(request: &DragRequest) -> Result<(), DragError> {
    let path = request.path().to_string_lossy().into_owned();

    autoreleasepool(|_| unsafe {
        let ns_path = NSString::from_str(&path);
        let url: Option<Retained<NSURL>> = msg_send![class!(NSURL), fileURLWithPath: &*ns_path];
        let url = url.ok_or_else(|| {
            DragError::NativeTakeoverFailed(format!("cannot build NSURL for {path}"))
        })?;

        let board: Option<Retained<AnyObject>> =
            msg_send![class!(NSPasteboard), pasteboardWithName: NSPasteboardNameDrag];
        let board = board.ok_or_else(|| {
            DragError::NativeTakeoverFailed("drag pasteboard unavailable".into())
        })?;

        let _: isize = msg_send![&*board, clearContents];
        let objects = NSArray::from_retained_slice(&[url]);
        let written: Bool = msg_send![&*board, writeObjects: &*objects];
        if written.is_false() {
            return Err(DragError::NativeTakeoverFailed(
                "drag pasteboard rejected the file URL".into(),
            ));
        }
        Ok(())
    })
}

fn application_running() -> bool {
    autoreleasepool(|_| unsafe {
        let app: Option<Retained<AnyObject>> = msg_send![class!(NSApplication), sharedApplication];
        app.is_some_and(|app| {
            let running: Bool = msg_send![&*app, isRunning];
            running.as_bool()
        })
    })
}

impl DragBackend for MacBackend {
    fn initialize(&self) -> Result<(), DragError> {
        Ok(())
    }

    fn set_main_thread_info(&self, _context: &ExecutionContext) -> Result<(), DragError> {
        Ok(())
    }

    fn start_drag(
        &self,
        request: &DragRequest,
        _context: Option<&ExecutionContext>,
    ) -> Result<(), DragError> {
        write_drag_pasteboard(request)?;
        tracing::debug!(request_id = %request.id(), "file URL written to drag pasteboard");
        Ok(())
    }

    fn is_available(&self) -> bool {
        application_running()
    }

    fn cleanup(&self) {}
}
