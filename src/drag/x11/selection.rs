//! `XdndSelection` owner thread — answers conversion requests from drop
//! targets with the current drag payload.
//!
//! Drop targets that speak XDND ask the selection owner for
//! `text/uri-list` when the pointer is released over them. The thread
//! drains queued events, then polls the connection fd (100 ms timeout so
//! the stop flag is seen). Each `SelectionRequest` is converted per
//! ICCCM §2.2 and answered with a `SelectionNotify`. On `SelectionClear`
//! the current owner is queried; if another client owns the drag channel
//! the payload is dropped. Clears that predate a later takeover are stale.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, EventMask, PropMode, SelectionNotifyEvent, SelectionRequestEvent,
    Window,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::drag::{DragError, DragRequest};

/// Atoms the owner thread needs.
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub xdnd_selection: Atom,
    pub targets: Atom,
    pub uri_list: Atom,
    pub utf8_string: Atom,
    pub text_plain_utf8: Atom,
}

impl Atoms {
    pub fn intern(conn: &RustConnection) -> Result<Self, ReplyError> {
        Ok(Self {
            xdnd_selection: intern(conn, b"XdndSelection")?,
            targets: intern(conn, b"TARGETS")?,
            uri_list: intern(conn, b"text/uri-list")?,
            utf8_string: intern(conn, b"UTF8_STRING")?,
            text_plain_utf8: intern(conn, b"text/plain;charset=utf-8")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom, ReplyError> {
    Ok(xproto::intern_atom(conn, false, name)?.reply()?.atom)
}

/// What the drag channel currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// `text/uri-list` body: one URI, CRLF terminated.
    pub uri_list: Vec<u8>,
    /// Plain path for text targets.
    pub text: Vec<u8>,
}

impl Payload {
    pub fn for_request(request: &DragRequest) -> Result<Self, DragError> {
        let uri = request.file_uri()?;
        Ok(Self {
            uri_list: format!("{uri}\r\n").into_bytes(),
            text: request.path().to_string_lossy().into_owned().into_bytes(),
        })
    }
}

/// Shared slot between request threads and the owner thread.
pub type PayloadSlot = Arc<Mutex<Option<Payload>>>;

/// Outcome of converting the selection to a requested target.
#[derive(Debug, PartialEq, Eq)]
enum Conversion {
    Atoms(Vec<Atom>),
    Bytes { type_: Atom, data: Vec<u8> },
    Refuse,
}

fn convert(target: Atom, atoms: &Atoms, payload: Option<&Payload>) -> Conversion {
    let Some(payload) = payload else {
        return Conversion::Refuse;
    };

    if target == atoms.targets {
        Conversion::Atoms(vec![
            atoms.targets,
            atoms.uri_list,
            atoms.utf8_string,
            atoms.text_plain_utf8,
        ])
    } else if target == atoms.uri_list {
        Conversion::Bytes {
            type_: atoms.uri_list,
            data: payload.uri_list.clone(),
        }
    } else if target == atoms.utf8_string || target == atoms.text_plain_utf8 {
        Conversion::Bytes {
            type_: target,
            data: payload.text.clone(),
        }
    } else {
        Conversion::Refuse
    }
}

/// Answer one `SelectionRequest`.
fn respond(
    conn: &RustConnection,
    window: Window,
    atoms: &Atoms,
    slot: &PayloadSlot,
    request: &SelectionRequestEvent,
) -> Result<(), x11rb::errors::ConnectionError> {
    // Obsolete clients pass None; ICCCM says use the target as property.
    let property = if request.property == x11rb::NONE {
        request.target
    } else {
        request.property
    };

    let conversion = if request.owner == window && request.selection == atoms.xdnd_selection {
        let payload = slot.lock().unwrap_or_else(PoisonError::into_inner);
        convert(request.target, atoms, payload.as_ref())
    } else {
        Conversion::Refuse
    };

    let reply_property = match conversion {
        Conversion::Atoms(list) => {
            conn.change_property32(
                PropMode::REPLACE,
                request.requestor,
                property,
                AtomEnum::ATOM,
                &list,
            )?;
            property
        }
        Conversion::Bytes { type_, data } => {
            conn.change_property8(PropMode::REPLACE, request.requestor, property, type_, &data)?;
            property
        }
        Conversion::Refuse => x11rb::NONE,
    };

    let notify = SelectionNotifyEvent {
        response_type: xproto::SELECTION_NOTIFY_EVENT,
        sequence: 0,
        time: request.time,
        requestor: request.requestor,
        selection: request.selection,
        target: request.target,
        property: reply_property,
    };
    xproto::send_event(conn, false, request.requestor, EventMask::NO_EVENT, notify)?;
    conn.flush()?;

    tracing::debug!(
        requestor = request.requestor,
        target = request.target,
        served = reply_property != x11rb::NONE,
        "answered XdndSelection request"
    );
    Ok(())
}

/// Whether a `SelectionClear` still applies once the current owner is
/// known. A clear queued before a later `take_over` must not wipe the
/// payload that takeover stored.
fn clear_applies(current_owner: Window, window: Window) -> bool {
    current_owner != window
}

/// Drop the payload if another client owns `XdndSelection` now.
fn on_selection_clear(
    conn: &RustConnection,
    window: Window,
    atoms: &Atoms,
    slot: &PayloadSlot,
) -> Result<(), ReplyError> {
    let mut payload = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let owner = xproto::get_selection_owner(conn, atoms.xdnd_selection)?
        .reply()?
        .owner;

    if clear_applies(owner, window) {
        payload.take();
        tracing::debug!(owner, "XdndSelection taken by another client");
    } else {
        tracing::debug!("stale SelectionClear, still the XdndSelection owner");
    }
    Ok(())
}

/// Clears `alive` when the owner thread exits, on every path.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawn the selection owner thread.
///
/// `alive` is set before the thread starts and cleared when it exits,
/// whether from `stop` or a connection error.
pub fn spawn_owner_thread(
    conn: Arc<RustConnection>,
    window: Window,
    atoms: Atoms,
    slot: PayloadSlot,
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    alive.store(true, Ordering::Release);
    let guard = AliveGuard(alive);

    std::thread::Builder::new()
        .name("xdnd-owner".into())
        .spawn(move || {
            let _guard = guard;
            let raw_fd = conn.stream().as_raw_fd();

            while !stop.load(Ordering::Relaxed) {
                // Replies read on request threads can leave events queued
                // without the fd becoming readable again; drain first.
                loop {
                    match conn.poll_for_event() {
                        Ok(Some(Event::SelectionRequest(request))) => {
                            if let Err(e) = respond(&conn, window, &atoms, &slot, &request) {
                                tracing::error!(error = %e, "failed to answer selection request");
                                return;
                            }
                        }
                        Ok(Some(Event::SelectionClear(clear)))
                            if clear.selection == atoms.xdnd_selection =>
                        {
                            if let Err(e) = on_selection_clear(&conn, window, &atoms, &slot) {
                                tracing::error!(error = %e, "failed to query selection owner");
                                return;
                            }
                        }
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!(error = %e, "X11 connection error");
                            return;
                        }
                    }
                }

                // SAFETY: raw_fd is the X11 connection fd, valid while conn is alive.
                let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
                let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

                match poll(&mut fds, PollTimeout::from(100u16)) {
                    Ok(_) | Err(nix::Error::EINTR) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "poll error on X11 fd");
                        return;
                    }
                }
            }
        })
}
