/// Connection lifecycle management for LibSQL databases
///
/// A [`Connection`] owns one native session and everything compiled on it.
/// Statements, cursors and the metadata resolver created from it share that
/// session; the caller must serialize their use (see the crate docs).
use crate::config::{ConnectionConfig, TransactionMode};
use crate::error::{Error, Result};
use crate::generated_keys::GeneratedKeys;
use crate::metadata::DatabaseMetaData;
use crate::native::NativeConnection;
use crate::savepoint::{self, Savepoint};
use crate::statement::{PreparedStatement, Statement};
use crate::transaction;
use crate::utils::safe_lock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// State shared by a connection and every object created from it.
pub(crate) struct ConnectionInner {
    pub(crate) native: Arc<NativeConnection>,
    pub(crate) config: Mutex<ConnectionConfig>,
    pub(crate) auto_commit: AtomicBool,
    pub(crate) savepoint_seq: AtomicU64,
    pub(crate) closed: AtomicBool,
    pub(crate) generated_keys: Arc<GeneratedKeys>,
    /// Held for the whole of a batch execution
    pub(crate) batch_lock: Mutex<()>,
}

impl ConnectionInner {
    pub(crate) fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::usage("database connection closed"));
        }
        Ok(())
    }

    pub(crate) fn is_auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    pub(crate) fn transaction_mode(&self) -> Result<TransactionMode> {
        Ok(safe_lock(&self.config, "transaction_mode config")?.transaction_mode)
    }

    pub(crate) fn config(&self) -> Result<ConnectionConfig> {
        Ok(safe_lock(&self.config, "config")?.clone())
    }

    pub(crate) fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.check_open()?;
        self.native.set_busy_timeout(timeout)?;
        safe_lock(&self.config, "set_busy_timeout config")?.busy_timeout = timeout;
        debug!(conn_id = %self.native.id(), ?timeout, "busy timeout changed");
        Ok(())
    }
}

pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.native.id())
            .field("auto_commit", &self.inner.is_auto_commit())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &str, config: ConnectionConfig) -> Result<Self> {
        let native = Arc::new(NativeConnection::open_local(
            path,
            config.encryption_key.as_deref(),
        )?);

        native.set_busy_timeout(config.busy_timeout)?;
        if let Some(enabled) = config.foreign_keys {
            let pragma = if enabled {
                "PRAGMA foreign_keys = ON"
            } else {
                "PRAGMA foreign_keys = OFF"
            };
            native.execute(pragma)?;
        }

        info!(conn_id = %native.id(), path, "connection opened");

        Ok(Connection {
            inner: Arc::new(ConnectionInner {
                generated_keys: GeneratedKeys::new(Arc::clone(&native)),
                native,
                config: Mutex::new(config),
                auto_commit: AtomicBool::new(true),
                savepoint_seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                batch_lock: Mutex::new(()),
            }),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(config: ConnectionConfig) -> Result<Self> {
        Connection::open(":memory:", config)
    }

    pub fn id(&self) -> &str {
        self.inner.native.id()
    }

    pub(crate) fn inner(&self) -> &Arc<ConnectionInner> {
        &self.inner
    }

    pub fn create_statement(&self) -> Result<Statement> {
        self.inner.check_open()?;
        Statement::new(Arc::clone(&self.inner))
    }

    pub fn prepare_statement(&self, sql: &str) -> Result<PreparedStatement> {
        self.inner.check_open()?;
        PreparedStatement::new(Arc::clone(&self.inner), sql)
    }

    pub fn metadata(&self) -> Result<DatabaseMetaData> {
        self.inner.check_open()?;
        Ok(DatabaseMetaData::new(Arc::clone(&self.inner)))
    }

    pub fn get_auto_commit(&self) -> Result<bool> {
        self.inner.check_open()?;
        Ok(self.inner.is_auto_commit())
    }

    pub fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        transaction::set_auto_commit(&self.inner, auto_commit)
    }

    pub fn commit(&self) -> Result<()> {
        transaction::commit(&self.inner)
    }

    pub fn rollback(&self) -> Result<()> {
        transaction::rollback(&self.inner)
    }

    /// Create an unnamed savepoint, leaving auto-commit mode if needed.
    pub fn set_savepoint(&self) -> Result<Savepoint> {
        savepoint::set_savepoint(&self.inner, None)
    }

    /// Create a named savepoint, leaving auto-commit mode if needed.
    pub fn set_named_savepoint(&self, name: &str) -> Result<Savepoint> {
        savepoint::set_savepoint(&self.inner, Some(name))
    }

    pub fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        savepoint::release_savepoint(&self.inner, savepoint)
    }

    pub fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        savepoint::rollback_to_savepoint(&self.inner, savepoint)
    }

    pub fn transaction_mode(&self) -> Result<TransactionMode> {
        self.inner.transaction_mode()
    }

    /// Mode used by transactions begun from now on.
    pub fn set_transaction_mode(&self, mode: TransactionMode) -> Result<()> {
        self.inner.check_open()?;
        safe_lock(&self.inner.config, "set_transaction_mode config")?.transaction_mode = mode;
        debug!(conn_id = %self.id(), ?mode, "transaction mode changed");
        Ok(())
    }

    pub fn config(&self) -> Result<ConnectionConfig> {
        self.inner.config()
    }

    /// How long the engine waits on a locked database before failing with BUSY.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.inner.set_busy_timeout(timeout)
    }

    /// Ask the engine to abort whatever it is running on this connection.
    pub fn interrupt(&self) -> Result<()> {
        self.inner.check_open()?;
        self.inner.native.interrupt()
    }

    pub fn last_insert_rowid(&self) -> Result<i64> {
        self.inner.check_open()?;
        self.inner.native.last_insert_rowid()
    }

    pub fn changes(&self) -> Result<u64> {
        self.inner.check_open()?;
        self.inner.native.changes()
    }

    pub fn total_changes(&self) -> Result<u64> {
        self.inner.check_open()?;
        self.inner.native.total_changes()
    }

    /// Number of statement handles still alive on this connection.
    pub fn open_handle_count(&self) -> Result<usize> {
        self.inner.native.open_handle_count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Close the connection. Every statement handle is finalized, so objects
    /// created from this connection fail with a usage error afterwards.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let finalized = self.inner.native.finalize_all()?;
        info!(conn_id = %self.id(), finalized, "connection closed");
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
