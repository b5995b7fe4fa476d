//! Native file drag takeover for desktop applications with web UIs.
//!
//! A web view detects drag intent after the native mouse-down is gone.
//! This crate lets the application hand one file to the OS drag
//! machinery anyway: [`drag::DragService`] owns the per-OS mechanism,
//! [`app::App`] is what the application shell talks to.

pub mod app;
pub mod drag;

pub use app::{App, START_DRAG_EVENT, WebEvent};
pub use drag::{DragBackend, DragError, DragRequest, DragService, ServiceConfig, ServiceState};
