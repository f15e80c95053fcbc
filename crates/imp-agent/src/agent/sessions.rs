//! Bookkeeping for connections being served, so shutdown can close them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::contact::Connection;

use super::AGENT_TARGET;

#[derive(Debug, Default)]
struct SessionTable {
    next_id: u64,
    open: HashMap<u64, Connection>,
}

#[derive(Debug, Default)]
pub(super) struct Sessions {
    table: Mutex<SessionTable>,
}

impl Sessions {
    /// Records a second handle to `connection` and returns its id.
    pub(super) fn track(&self, connection: &Connection) -> u64 {
        let mut table = self.lock();
        let id = table.next_id;
        table.next_id += 1;
        match connection.try_clone() {
            Ok(handle) => {
                table.open.insert(id, handle);
            }
            Err(error) => debug!(
                target: AGENT_TARGET,
                peer = %connection.peer(),
                error = %error,
                "session will not be closed on shutdown"
            ),
        }
        id
    }

    pub(super) fn forget(&self, id: u64) {
        self.lock().open.remove(&id);
    }

    pub(super) fn len(&self) -> usize {
        self.lock().open.len()
    }

    pub(super) fn close_all(&self) {
        let open: Vec<Connection> = self.lock().open.drain().map(|(_, handle)| handle).collect();
        for handle in open {
            if let Err(error) = handle.close() {
                debug!(
                    target: AGENT_TARGET,
                    peer = %handle.peer(),
                    error = %error,
                    "failed to close session"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
