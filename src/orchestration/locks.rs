use crate::domain::EmployeeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<EmployeeId, Arc<AsyncMutex<()>>>>>;

/// Per-employee critical sections. Settlements for one employee run one at
/// a time; different employees never contend. An employee's entry lives only
/// while someone holds or waits for it.
#[derive(Debug, Default, Clone)]
pub struct EmployeeLocks {
    locks: LockMap,
}

impl EmployeeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for, then hold, the employee's lock until the guard drops.
    pub async fn acquire(&self, employee_id: EmployeeId) -> EmployeeGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(employee_id).or_default())
        };
        EmployeeGuard {
            employee_id,
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
        }
    }
}

/// Held employee lock. Dropping it releases the lock and forgets the
/// employee once nobody else holds or waits for it.
#[derive(Debug)]
pub struct EmployeeGuard {
    employee_id: EmployeeId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl Drop for EmployeeGuard {
    fn drop(&mut self) {
        // Clones happen under the map lock, so a count of one here means no
        // acquirer can be between lookup and lock.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(self.guard.take());
        if locks
            .get(&self.employee_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.employee_id);
        }
    }
}
