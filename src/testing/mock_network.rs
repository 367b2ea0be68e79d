//! Recording network binder

use crate::errors::NetworkError;
use crate::network::NetworkBinder;
use crate::types::NetworkHandle;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
pub struct MockNetwork {
    bound: Mutex<Option<NetworkHandle>>,
    fail_next: AtomicBool,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The next `bind` call is rejected.
    pub fn fail_next_bind(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn is_bound(&self) -> bool {
        self.bound_to().is_some()
    }

    pub fn bound_to(&self) -> Option<NetworkHandle> {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }
}

impl NetworkBinder for MockNetwork {
    fn bind(&self, handle: &NetworkHandle) -> Result<(), NetworkError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(NetworkError::BindFailed {
                interface: handle.interface.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        self.binds.fetch_add(1, Ordering::SeqCst);
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.clone());
        Ok(())
    }

    fn unbind(&self) {
        self.unbinds.fetch_add(1, Ordering::SeqCst);
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
