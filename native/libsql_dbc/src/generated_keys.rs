/// Shared generated-key lookup.
///
/// Generated keys are read with one demand-created `SELECT last_insert_rowid()`
/// statement per connection. Every statement that asks for generated keys, and
/// every result set handed out, holds a [`GeneratedKeysLease`]. The shared
/// statement is finalized when the last lease is released, whichever order the
/// holders close in.
use crate::constants::GENERATED_KEYS_COLUMN;
use crate::error::{Error, Result};
use crate::native::{NativeConnection, StepResult, StmtHandle};
use crate::utils::{safe_lock, safe_lock_arc};
use libsql::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

const LAST_INSERT_ROWID_SQL: &str = "SELECT last_insert_rowid()";

pub struct GeneratedKeys {
    native: Arc<NativeConnection>,
    handle: Mutex<Option<StmtHandle>>,
    holders: AtomicUsize,
}

impl GeneratedKeys {
    pub fn new(native: Arc<NativeConnection>) -> Arc<Self> {
        Arc::new(GeneratedKeys {
            native,
            handle: Mutex::new(None),
            holders: AtomicUsize::new(0),
        })
    }

    /// Take a new share of the lookup statement.
    pub fn acquire(self: &Arc<Self>) -> GeneratedKeysLease {
        let holders = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(holders, "generated keys lease acquired");
        GeneratedKeysLease {
            shared: Arc::clone(self),
            released: false,
        }
    }

    /// Number of outstanding leases.
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    /// Whether the lookup statement is currently compiled.
    pub fn is_prepared(&self) -> bool {
        safe_lock(&self.handle, "generated keys is_prepared")
            .map(|h| h.is_some())
            .unwrap_or(false)
    }

    pub fn column_name(&self) -> &'static str {
        GENERATED_KEYS_COLUMN
    }

    /// Read the last inserted rowid through the shared statement, compiling it
    /// on first use.
    fn fetch(&self) -> Result<Value> {
        let mut slot = safe_lock(&self.handle, "generated keys fetch")?;
        let handle = match slot.as_ref() {
            Some(handle) => handle.clone(),
            None => {
                let handle = self.native.prepare(LAST_INSERT_ROWID_SQL)?;
                *slot = Some(handle.clone());
                handle
            }
        };
        drop(slot);

        let shared_stmt = self.native.statement(&handle)?;
        let mut stmt = safe_lock_arc(&shared_stmt, "generated keys stmt")?;
        stmt.begin_execution()?;
        let value = match stmt.step()? {
            StepResult::Row => stmt.column_value(0)?,
            StepResult::Done => {
                return Err(Error::usage("last_insert_rowid() returned no row"));
            }
        };
        stmt.reset();
        Ok(value)
    }

    fn release_one(&self) {
        let previous = self.holders.fetch_sub(1, Ordering::SeqCst);
        if previous != 1 {
            return;
        }

        let handle = match safe_lock(&self.handle, "generated keys release") {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            // Already-closed connections have finalized everything
            let _ = self.native.finalize(&handle);
            debug!("generated keys statement finalized");
        }
    }
}

/// One holder's share of the generated-key statement.
pub struct GeneratedKeysLease {
    shared: Arc<GeneratedKeys>,
    released: bool,
}

impl GeneratedKeysLease {
    /// Current value of `last_insert_rowid()`.
    pub fn fetch(&self) -> Result<Value> {
        if self.released {
            return Err(Error::usage("generated keys lease already released"));
        }
        self.shared.fetch()
    }

    /// Another share of the same statement.
    pub fn share(&self) -> GeneratedKeysLease {
        self.shared.acquire()
    }

    /// Give the share back; the last release finalizes the statement.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.release_one();
        }
    }
}

impl Drop for GeneratedKeysLease {
    fn drop(&mut self) {
        self.release();
    }
}
