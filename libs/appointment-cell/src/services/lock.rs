use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// One async mutex per doctor, created on demand and dropped once no task
/// holds or waits for it.
#[derive(Default, Clone)]
pub struct DoctorLocks {
    table: LockTable,
}

/// Held while a booking for one doctor runs its check and insert.
pub struct DoctorLockGuard {
    doctor_id: String,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: &str) -> DoctorLockGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(table.entry(doctor_id.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;

        DoctorLockGuard {
            doctor_id: doctor_id.to_string(),
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    pub fn tracked_doctors(&self) -> usize {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

impl Drop for DoctorLockGuard {
    fn drop(&mut self) {
        // Release first so the strong count only reflects other holders and waiters
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = table
            .get(&self.doctor_id)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);

        if idle {
            table.remove(&self.doctor_id);
        }
    }
}
