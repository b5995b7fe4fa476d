//! Fallback for targets without a drag takeover mechanism.

use crate::drag::{DragBackend, DragError, DragRequest, ExecutionContext, ServiceConfig};

/// Never available; every request fails with `MechanismUnavailable`.
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new(_config: &ServiceConfig) -> Self {
        Self
    }
}

impl DragBackend for UnsupportedBackend {
    fn initialize(&self) -> Result<(), DragError> {
        Ok(())
    }

    fn set_main_thread_info(&self, _context: &ExecutionContext) -> Result<(), DragError> {
        Ok(())
    }

    fn start_drag(
        &self,
        _request: &DragRequest,
        _context: Option<&ExecutionContext>,
    ) -> Result<(), DragError> {
        Err(DragError::MechanismUnavailable(format!(
            "no drag takeover on {}",
            std::env::consts::OS
        )))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn cleanup(&self) {}
}
