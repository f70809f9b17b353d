/*
 * Copyright 2023 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hex_literal::hex;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::Compression;
use crate::{CloseError, CloseStep, Context, Error, Operation};

use super::config::SqliteConfig;
use super::pool::{ConnectionOptions, Pool, PooledConnection, POLL_INTERVAL};
use super::transaction::{with_transaction, TxError};

/// A UUID which acts as the version ID of the database format.
const CURRENT_VERSION: Uuid = Uuid::from_bytes(hex!("5b1c7e3a 9d2f 4c61 8a0e 3f6d2b94c7e1"));

/// The shared handle to one SQLite database.
///
/// This owns the connection pool and the lock which every access to the database goes through.
/// Reads take the lock shared and writes take it exclusive. SQLite only allows one writer at a
/// time no matter how many connections are open, so the lock is per database rather than per
/// keyspace.
#[derive(Debug)]
pub(super) struct Database {
    path: PathBuf,
    compression: Compression,
    lock: Arc<RwLock<()>>,
    pool: Pool,
    /// The tables which are known to exist.
    tables: Mutex<HashSet<String>>,
}

/// Shared access to the database, for reading.
///
/// This holds the store lock in shared mode and a pooled connection. Both are released on drop.
pub(super) struct SharedAccess {
    connection: PooledConnection,
    _guard: ArcRwLockReadGuard<RawRwLock, ()>,
}

/// Exclusive access to the database, for writing.
///
/// This holds the store lock in exclusive mode and a pooled connection. Both are released on drop.
pub(super) struct ExclusiveAccess {
    connection: PooledConnection,
    _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
}

macro_rules! impl_access {
    ($access:ident) => {
        impl fmt::Debug for $access {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($access))
                    .field("connection", &self.connection)
                    .finish_non_exhaustive()
            }
        }

        impl Deref for $access {
            type Target = Connection;

            fn deref(&self) -> &Self::Target {
                &self.connection
            }
        }

        impl DerefMut for $access {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.connection
            }
        }
    };
}

impl_access!(SharedAccess);
impl_access!(ExclusiveAccess);

/// Acquire a lock guard, giving up once `ctx` is done.
///
/// `try_for` attempts to acquire the guard within a timeout and `block` waits for it forever.
fn acquire_guard<G>(
    ctx: &Context,
    mut try_for: impl FnMut(Duration) -> Option<G>,
    block: impl FnOnce() -> G,
) -> crate::Result<G> {
    ctx.check()?;
    if !ctx.is_cancellable() {
        return Ok(block());
    }
    loop {
        let timeout = ctx
            .remaining()
            .map_or(POLL_INTERVAL, |remaining| remaining.min(POLL_INTERVAL));
        if let Some(guard) = try_for(timeout) {
            return Ok(guard);
        }
        ctx.check()?;
    }
}

impl Database {
    /// Open the database described by `config`, creating it if it doesn't exist.
    pub fn open(config: &SqliteConfig) -> crate::Result<Self> {
        config.validate()?;

        let options = ConnectionOptions {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout(),
            journal_mode: config.journal_mode,
        };
        let database = Database {
            path: config.path.clone(),
            compression: config.compression,
            lock: Arc::new(RwLock::new(())),
            pool: Pool::new(options, config.effective_pool_size()),
            tables: Mutex::new(HashSet::new()),
        };
        database.initialize()?;

        info!(
            path = %database.path.display(),
            pool_size = database.pool.max_size(),
            compression = database.compression.method(),
            "opened SQLite store"
        );
        Ok(database)
    }

    /// Create the metadata table, or check it against this handle if it already exists.
    fn initialize(&self) -> crate::Result<()> {
        let ctx = Context::background();
        let mut access = self.exclusive(&ctx)?;
        let method = self.compression.method();

        with_transaction(
            &mut access,
            &ctx,
            TransactionBehavior::Immediate,
            Operation::Open,
            None,
            |transaction| {
                transaction.execute_batch(
                    r#"
                        CREATE TABLE IF NOT EXISTS metadata (
                            key TEXT PRIMARY KEY,
                            value BLOB NOT NULL
                        );
                    "#,
                )?;

                let version_bytes: Option<Vec<u8>> = transaction
                    .query_row(
                        r#"
                            SELECT value FROM metadata
                            WHERE key = 'version';
                        "#,
                        params![],
                        |row| row.get(0),
                    )
                    .optional()?;

                match version_bytes {
                    Some(bytes) => {
                        let version = Uuid::from_slice(bytes.as_slice())
                            .map_err(|_| Error::UnsupportedFormat)?;
                        if version != CURRENT_VERSION {
                            return Err(TxError::Store(Error::UnsupportedFormat));
                        }
                    }
                    None => {
                        transaction.execute(
                            r#"
                                INSERT INTO metadata (key, value)
                                VALUES ('version', ?1), ('compression', ?2);
                            "#,
                            params![&CURRENT_VERSION.as_bytes()[..], method.as_bytes()],
                        )?;
                    }
                }

                let stored: Vec<u8> = transaction.query_row(
                    r#"
                        SELECT value FROM metadata
                        WHERE key = 'compression';
                    "#,
                    params![],
                    |row| row.get(0),
                )?;
                if stored != method.as_bytes() {
                    return Err(TxError::Store(Error::InvalidConfig(format!(
                        "The database was created with compression '{}', but '{}' was requested.",
                        String::from_utf8_lossy(&stored),
                        method
                    ))));
                }

                Ok(())
            },
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The compression method of this database, which is fixed for its lifetime.
    pub fn compression(&self) -> &Compression {
        &self.compression
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Acquire the lock in shared mode and check out a connection.
    pub fn shared(&self, ctx: &Context) -> crate::Result<SharedAccess> {
        let guard = acquire_guard(
            ctx,
            |timeout| self.lock.try_read_arc_for(timeout),
            || self.lock.read_arc(),
        )?;
        let connection = self.pool.acquire(ctx)?;
        Ok(SharedAccess {
            connection,
            _guard: guard,
        })
    }

    /// Acquire the lock in exclusive mode and check out a connection.
    pub fn exclusive(&self, ctx: &Context) -> crate::Result<ExclusiveAccess> {
        let guard = acquire_guard(
            ctx,
            |timeout| self.lock.try_write_arc_for(timeout),
            || self.lock.write_arc(),
        )?;
        let connection = self.pool.acquire(ctx)?;
        Ok(ExclusiveAccess {
            connection,
            _guard: guard,
        })
    }

    /// Return whether `table` is known to exist.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.lock().contains(table)
    }

    /// Record that `table` exists.
    pub fn add_table(&self, table: String) {
        self.tables.lock().insert(table);
    }

    /// Checkpoint and vacuum the database, then close every connection.
    ///
    /// This waits for every other access to the database to finish. The checkpoint and vacuum
    /// are best-effort, and the connections are closed even if they fail. Every failure is
    /// reported in the returned error. Closing a database which is already closed does nothing.
    pub fn close(&self, ctx: &Context) -> crate::Result<()> {
        let _guard = acquire_guard(
            ctx,
            |timeout| self.lock.try_write_arc_for(timeout),
            || self.lock.write_arc(),
        )?;

        if self.pool.is_closed() {
            return Ok(());
        }

        let mut failures = Vec::new();

        match self.pool.acquire(ctx) {
            Ok(connection) => {
                if let Err(error) =
                    connection.query_row("PRAGMA wal_checkpoint(TRUNCATE)", params![], |_| Ok(()))
                {
                    warn!(%error, "failed to checkpoint the database before closing");
                    failures.push((CloseStep::Checkpoint, anyhow::Error::from(error)));
                }
                if let Err(error) = connection.execute_batch("VACUUM") {
                    warn!(%error, "failed to vacuum the database before closing");
                    failures.push((CloseStep::Vacuum, anyhow::Error::from(error)));
                }
            }
            Err(error) => {
                warn!(%error, "failed to get a connection to checkpoint the database");
                failures.push((CloseStep::Checkpoint, anyhow::Error::from(error)));
            }
        }

        for error in self.pool.close() {
            warn!(%error, "failed to close a connection");
            failures.push((CloseStep::Release, error));
        }

        info!(path = %self.path.display(), failures = failures.len(), "closed SQLite store");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(CloseError::new(failures)))
        }
    }
}
