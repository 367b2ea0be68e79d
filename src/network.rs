//! Process network binding for HTTP calls to the camera's web service.

use crate::errors::NetworkError;
use crate::types::NetworkHandle;

/// Binds outgoing process sockets to a specific network interface.
pub trait NetworkBinder: Send + Sync {
    fn bind(&self, handle: &NetworkHandle) -> Result<(), NetworkError>;

    /// Restore default routing for all process sockets.
    fn unbind(&self);
}

/// Scoped binding: the process is unbound when this guard drops, on every
/// exit path including task cancellation.
pub struct NetworkBinding<'a> {
    binder: &'a dyn NetworkBinder,
    handle: NetworkHandle,
}

impl<'a> NetworkBinding<'a> {
    pub fn bind(binder: &'a dyn NetworkBinder, handle: NetworkHandle) -> Result<Self, NetworkError> {
        binder.bind(&handle)?;
        log::debug!("process bound to camera network {}", handle);
        Ok(Self { binder, handle })
    }

    pub fn handle(&self) -> &NetworkHandle {
        &self.handle
    }
}

impl Drop for NetworkBinding<'_> {
    fn drop(&mut self) {
        self.binder.unbind();
        log::debug!("process unbound from camera network {}", self.handle);
    }
}
