use crate::domain::VendorId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per vendor. Every mutation of a vendor's wallet runs while
/// holding that vendor's guard, which linearizes them; different vendors
/// proceed in parallel.
#[derive(Default, Clone)]
pub struct VendorLocks {
    locks: Arc<Mutex<HashMap<VendorId, Arc<AsyncMutex<()>>>>>,
}

impl VendorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, vendor: VendorId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(vendor).or_default())
        };
        lock.lock_owned().await
    }
}
