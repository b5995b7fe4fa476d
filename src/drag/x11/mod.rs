//! X11 backend — drag takeover through the `XdndSelection` selection.
//!
//! XDND drop targets fetch the dragged data by converting
//! `XdndSelection` when the drop happens. Owning that selection with a
//! helper window and serving a `text/uri-list` makes whatever the user
//! is dragging resolve to our file, without a native button press and
//! from any thread.
//!
//! The connection, helper window and owner thread live from
//! `initialize` to `cleanup`.

pub mod selection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, CreateWindowAux, Window, WindowClass};
use x11rb::rust_connection::RustConnection;

use crate::drag::{DragBackend, DragError, DragRequest, ExecutionContext, ServiceConfig};
use selection::{Atoms, Payload, PayloadSlot};

/// Live X11 state shared by request threads.
struct Session {
    conn: Arc<RustConnection>,
    window: Window,
    atoms: Atoms,
    payload: PayloadSlot,
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
}

impl Session {
    fn open(display: Option<&str>) -> Result<(Self, JoinHandle<()>), DragError> {
        let (conn, screen_num) = RustConnection::connect(display)
            .map_err(|e| DragError::ServiceInitFailed(format!("X11 connect failed: {e}")))?;
        let root = conn.setup().roots[screen_num].root;

        let atoms = Atoms::intern(&conn)
            .map_err(|e| DragError::ServiceInitFailed(format!("intern_atom: {e}")))?;

        // Unmapped InputOnly window: a selection owner that never appears.
        let window = conn
            .generate_id()
            .map_err(|e| DragError::ServiceInitFailed(format!("generate_id: {e}")))?;
        xproto::create_window(
            &conn,
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .map_err(|e| DragError::ServiceInitFailed(format!("create_window send: {e}")))?
        .check()
        .map_err(|e| DragError::ServiceInitFailed(format!("create_window: {e}")))?;

        let conn = Arc::new(conn);
        let payload: PayloadSlot = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(false));

        let thread = selection::spawn_owner_thread(
            Arc::clone(&conn),
            window,
            atoms,
            Arc::clone(&payload),
            Arc::clone(&stop),
            Arc::clone(&alive),
        )
        .map_err(|e| {
            let _ = xproto::destroy_window(&*conn, window);
            let _ = conn.flush();
            DragError::ServiceInitFailed(format!("failed to spawn selection thread: {e}"))
        })?;

        tracing::debug!(screen = screen_num, window, "XdndSelection helper window created");

        Ok((
            Self {
                conn,
                window,
                atoms,
                payload,
                stop,
                alive,
            },
            thread,
        ))
    }

    fn take_over(&self, request: &DragRequest) -> Result<(), DragError> {
        let payload = Payload::for_request(request)?;
        // Held across the ownership round trip; the owner thread takes the
        // same lock before deciding whether a SelectionClear still applies.
        let mut slot = self.payload.lock().unwrap_or_else(PoisonError::into_inner);

        xproto::set_selection_owner(
            &*self.conn,
            self.window,
            self.atoms.xdnd_selection,
            x11rb::CURRENT_TIME,
        )
        .map_err(|e| DragError::NativeTakeoverFailed(format!("set_selection_owner: {e}")))?;

        let owner = xproto::get_selection_owner(&*self.conn, self.atoms.xdnd_selection)
            .map_err(|e| DragError::NativeTakeoverFailed(format!("get_selection_owner: {e}")))?
            .reply()
            .map_err(|e| {
                DragError::NativeTakeoverFailed(format!("get_selection_owner reply: {e}"))
            })?
            .owner;

        if owner != self.window {
            return Err(DragError::NativeTakeoverFailed(format!(
                "XdndSelection owned by 0x{owner:08x} after takeover"
            )));
        }

        *slot = Some(payload);
        Ok(())
    }

    fn close(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(e) = xproto::destroy_window(&*self.conn, self.window) {
            tracing::debug!(error = %e, "destroy_window failed");
        }
        if let Err(e) = self.conn.flush() {
            tracing::debug!(error = %e, "flush after destroy_window failed");
        }
    }
}

/// X11 implementation of [`DragBackend`].
pub struct X11Backend {
    display: Option<String>,
    session: Mutex<Option<Arc<Session>>>,
    owner_thread: Mutex<Option<JoinHandle<()>>>,
}

impl X11Backend {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            display: config.display.clone(),
            session: Mutex::new(None),
            owner_thread: Mutex::new(None),
        }
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DragBackend for X11Backend {
    fn initialize(&self) -> Result<(), DragError> {
        let (session, thread) = Session::open(self.display.as_deref())?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
        *self
            .owner_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread);
        Ok(())
    }

    fn set_main_thread_info(&self, context: &ExecutionContext) -> Result<(), DragError> {
        // X11 requests are not bound to a thread.
        tracing::debug!(
            os_thread_id = context.os_thread_id(),
            "X11 backend ignores main thread info"
        );
        Ok(())
    }

    fn start_drag(
        &self,
        request: &DragRequest,
        _context: Option<&ExecutionContext>,
    ) -> Result<(), DragError> {
        let session = self
            .session()
            .ok_or_else(|| DragError::MechanismUnavailable("no X11 session".into()))?;
        session.take_over(request)
    }

    fn is_available(&self) -> bool {
        self.session()
            .is_some_and(|s| s.alive.load(Ordering::Acquire))
    }

    fn cleanup(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.close();
        }

        let thread = self
            .owner_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Exits within one poll timeout of the stop flag.
        if let Some(handle) = thread
            && let Err(e) = handle.join()
        {
            tracing::warn!("XdndSelection owner thread panicked: {e:?}");
        }
    }
}
