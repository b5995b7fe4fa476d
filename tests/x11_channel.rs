//! Reads `XdndSelection` back through an independent X11 client, the
//! way a drop target would. Skipped when no display is reachable.
//!
//! Everything runs in one test: the selection is global to the display,
//! so parallel tests would steal it from each other.

#![cfg(target_os = "linux")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use dragout::{DragError, DragService, ServiceConfig};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{self, Atom, AtomEnum, CreateWindowAux, Window, WindowClass};
use x11rb::rust_connection::RustConnection;

struct DropTarget {
    conn: RustConnection,
    window: Window,
    selection: Atom,
}

impl DropTarget {
    fn connect() -> Option<Self> {
        std::env::var_os("DISPLAY")?;
        let (conn, screen) = RustConnection::connect(None).ok()?;
        let root = conn.setup().roots[screen].root;
        let window = conn.generate_id().unwrap();
        xproto::create_window(
            &conn,
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .unwrap()
        .check()
        .unwrap();
        let selection = intern(&conn, b"XdndSelection");
        Some(Self {
            conn,
            window,
            selection,
        })
    }

    fn owner(&self) -> Window {
        xproto::get_selection_owner(&self.conn, self.selection)
            .unwrap()
            .reply()
            .unwrap()
            .owner
    }

    /// Become the `XdndSelection` owner, as a competing drag source would.
    fn take_selection(&self) {
        xproto::set_selection_owner(
            &self.conn,
            self.window,
            self.selection,
            x11rb::CURRENT_TIME,
        )
        .unwrap();
        self.conn.flush().unwrap();
    }

    /// Convert the selection to `target`; `None` if the owner refused.
    fn fetch(&self, target: &[u8]) -> Option<Vec<u8>> {
        let target = intern(&self.conn, target);
        let property = intern(&self.conn, b"DRAGOUT_TEST");
        xproto::convert_selection(
            &self.conn,
            self.window,
            self.selection,
            target,
            property,
            x11rb::CURRENT_TIME,
        )
        .unwrap();
        self.conn.flush().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let notify = loop {
            match self.conn.poll_for_event().unwrap() {
                Some(Event::SelectionNotify(n)) if n.requestor == self.window => break n,
                Some(_) => {}
                None => {
                    assert!(Instant::now() < deadline, "no SelectionNotify within 2s");
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        };
        if notify.property == x11rb::NONE {
            return None;
        }

        let reply = xproto::get_property(
            &self.conn,
            true,
            self.window,
            property,
            AtomEnum::ANY,
            0,
            4096,
        )
        .unwrap()
        .reply()
        .unwrap();
        Some(reply.value)
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Atom {
    xproto::intern_atom(conn, false, name)
        .unwrap()
        .reply()
        .unwrap()
        .atom
}

fn uri_list(path: &std::path::Path) -> Vec<u8> {
    let uri = url::Url::from_file_path(path).unwrap();
    format!("{uri}\r\n").into_bytes()
}

#[test]
fn xdnd_selection_serves_dragged_file() {
    let Some(target) = DropTarget::connect() else {
        eprintln!("no X11 display, skipping");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.pdf");
    let other = dir.path().join("other report.pdf");
    std::fs::write(&report, b"%PDF").unwrap();
    std::fs::write(&other, b"%PDF").unwrap();

    let service = Arc::new(DragService::new(&ServiceConfig::default()));

    // Uninitialized: unavailable, no takeover.
    assert!(!service.is_available());
    assert!(matches!(
        service.start_drag(&report),
        Err(DragError::MechanismUnavailable(_))
    ));

    service.initialize().unwrap();
    service.set_main_thread_info().unwrap();
    assert!(service.is_available());

    // Existing file: we own the channel and serve its URI.
    service.start_drag(&report).unwrap();
    let owner = target.owner();
    assert_ne!(owner, x11rb::NONE);
    assert_eq!(target.fetch(b"text/uri-list"), Some(uri_list(&report)));
    assert_eq!(
        target.fetch(b"UTF8_STRING"),
        Some(report.to_string_lossy().as_bytes().to_vec())
    );

    let targets = target.fetch(b"TARGETS").unwrap();
    assert_eq!(targets.len() % 4, 0);
    assert!(targets.len() >= 8);

    assert_eq!(target.fetch(b"image/png"), None);

    // Missing file: rejected, channel untouched.
    let missing = dir.path().join("missing.pdf");
    assert!(matches!(
        service.start_drag(&missing),
        Err(DragError::PathNotFound(_))
    ));
    assert_eq!(target.owner(), owner);
    assert_eq!(target.fetch(b"text/uri-list"), Some(uri_list(&report)));

    // Racing requests: last writer wins, exactly one file remains.
    let handles: Vec<_> = [report.clone(), other.clone()]
        .into_iter()
        .map(|path| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.start_drag(path))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    let held = target.fetch(b"text/uri-list").unwrap();
    assert!(held == uri_list(&report) || held == uri_list(&other));

    // Another client takes the channel and we take it straight back: the
    // SelectionClear handled after our takeover must not empty it.
    target.take_selection();
    service.start_drag(&report).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(target.owner(), owner);
    assert_eq!(target.fetch(b"text/uri-list"), Some(uri_list(&report)));

    // Same, but the clear is handled first: the next drag serves its file.
    target.take_selection();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(target.owner(), target.window);
    service.start_drag(&other).unwrap();
    assert_eq!(target.owner(), owner);
    assert_eq!(target.fetch(b"text/uri-list"), Some(uri_list(&other)));

    // Shut down: unavailable, no further takeover.
    service.cleanup();
    assert!(!service.is_available());
    assert!(matches!(
        service.start_drag(&report),
        Err(DragError::MechanismUnavailable(_))
    ));
}
