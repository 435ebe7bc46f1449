//! In-process scoped lock over a session id, so two concurrent session-engine
//! workers handling the same `session_id` serialize rather than race on the
//! read-modify-write. Grounded on `sg-daemon::server`'s per-client-id keyed
//! state: a single process holds one lock table, keyed the same way.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

pub struct SessionLockTable {
    locked: Mutex<HashSet<String>>,
    released: Condvar,
}

impl SessionLockTable {
    pub fn new() -> Self {
        SessionLockTable {
            locked: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Block until `id` is free, then hold it until the returned guard drops.
    pub fn acquire(&self, id: &str) -> SessionLockGuard<'_> {
        let mut locked = self.locked.lock().unwrap();
        while locked.contains(id) {
            locked = self.released.wait(locked).unwrap();
        }
        locked.insert(id.to_string());
        SessionLockGuard {
            table: self,
            id: id.to_string(),
        }
    }
}

impl Default for SessionLockTable {
    fn default() -> Self {
        SessionLockTable::new()
    }
}

pub struct SessionLockGuard<'a> {
    table: &'a SessionLockTable,
    id: String,
}

impl Drop for SessionLockGuard<'_> {
    fn drop(&mut self) {
        let mut locked = self.table.locked.lock().unwrap();
        locked.remove(&self.id);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn second_acquire_waits_for_first_to_drop() {
        let table = Arc::new(SessionLockTable::new());
        let guard = table.acquire("s1");

        let table2 = table.clone();
        let handle = std::thread::spawn(move || {
            let _guard = table2.acquire("s1");
        });

        std::thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        drop(guard);
        handle.join().unwrap();
    }

    #[test]
    fn distinct_ids_do_not_contend() {
        let table = SessionLockTable::new();
        let _a = table.acquire("s1");
        let _b = table.acquire("s2");
    }
}
