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

use std::path::Path;
use std::sync::Arc;

use rusqlite::TransactionBehavior;
use static_assertions::assert_impl_all;
use tracing::debug;

use crate::store::key::KeyspacePath;
use crate::store::Compression;
use crate::{Context, Error, Operation};

use super::config::SqliteConfig;
use super::database::Database;
use super::kv::SqliteKv;
use super::transaction::with_transaction;

/// A key-value store backed by a SQLite database.
///
/// A `SqliteStore` is a registry of keyspaces. Each keyspace is stored in its own table and is
/// accessed through a [`SqliteKv`]. Tables are created the first time a keyspace is requested.
///
/// Keyspaces can be grouped into namespaces with [`SqliteStore::sub`], which returns a view of the
/// same database. Every view and every `SqliteKv` derived from a store share its connection pool
/// and lock, so they can be used concurrently from many threads.
///
/// The store must be closed with [`SqliteStore::close`] to checkpoint and compact the database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database: Arc<Database>,
    prefix: KeyspacePath,
    root_keyspace: String,
}

assert_impl_all!(SqliteStore: Send, Sync);

impl SqliteStore {
    /// Open or create a `SqliteStore` using the given `config`.
    ///
    /// # Errors
    /// - `Error::InvalidConfig`: The config is invalid, or it uses a different compression method
    /// than the one the database was created with.
    /// - `Error::UnsupportedFormat`: The database is not a valid `SqliteStore` or its format is no
    /// longer supported by the library.
    /// - `Error::Internal`: The database could not be opened.
    pub(super) fn new(config: &SqliteConfig) -> crate::Result<Self> {
        Ok(SqliteStore {
            database: Arc::new(Database::open(config)?),
            prefix: KeyspacePath::root(),
            root_keyspace: config.keyspace.clone(),
        })
    }

    /// Return a handle to the keyspace `name` in this namespace, creating it if necessary.
    ///
    /// # Errors
    /// - `Error::Cancelled`: The context was done before the keyspace could be created.
    /// - `Error::Closed`: The store has been closed.
    /// - `Error::Internal`: The table for the keyspace could not be created.
    pub fn keyspace(&self, ctx: &Context, name: &str) -> crate::Result<SqliteKv> {
        if self.database.is_closed() {
            return Err(Error::Closed);
        }

        let table = self.prefix.join(name).table_name();

        if !self.database.has_table(&table) {
            let mut access = self.database.exclusive(ctx)?;

            // Another caller may have created it while we were waiting for the lock.
            if !self.database.has_table(&table) {
                let statement = format!(
                    r#"
                        CREATE TABLE IF NOT EXISTS "{}" (
                            key TEXT PRIMARY KEY,
                            value BLOB NOT NULL,
                            vsize INTEGER NOT NULL
                        ) WITHOUT ROWID;
                    "#,
                    table
                );
                with_transaction(
                    &mut access,
                    ctx,
                    TransactionBehavior::Immediate,
                    Operation::CreateKeyspace,
                    None,
                    |transaction| Ok(transaction.execute_batch(&statement)?),
                )?;
                debug!(keyspace = name, %table, "created keyspace");
                self.database.add_table(table.clone());
            }
        }

        Ok(SqliteKv::new(Arc::clone(&self.database), table))
    }

    /// Return a handle to the default keyspace of this namespace.
    ///
    /// The name of the default keyspace is [`SqliteConfig::keyspace`].
    pub fn root(&self, ctx: &Context) -> crate::Result<SqliteKv> {
        self.keyspace(ctx, &self.root_keyspace)
    }

    /// Return a view of the namespace `name` nested in this one.
    ///
    /// This is cheap. The view shares this store's database, and no tables are created until a
    /// keyspace is requested from it.
    pub fn sub(&self, name: &str) -> SqliteStore {
        SqliteStore {
            database: Arc::clone(&self.database),
            prefix: self.prefix.join(name),
            root_keyspace: self.root_keyspace.clone(),
        }
    }

    /// The path of the database.
    pub fn path(&self) -> &Path {
        self.database.path()
    }

    /// The compression method used for values in this store.
    pub fn compression(&self) -> Compression {
        *self.database.compression()
    }

    /// Checkpoint and compact the database, then close all of its connections.
    ///
    /// This closes the whole database, including every other view and keyspace derived from it.
    /// It waits until every in-flight operation has finished, including any [`ListKeys`]
    /// iterators which are still alive, so don't call it while holding one.
    ///
    /// Checkpointing and compacting are best-effort. The connections are closed even if they fail,
    /// and every failure is reported together in an `Error::Close`. After this returns, every
    /// operation on the store fails with `Error::Closed`. Closing a closed store does nothing.
    ///
    /// [`ListKeys`]: crate::store::ListKeys
    pub fn close(&self, ctx: &Context) -> crate::Result<()> {
        self.database.close(ctx)
    }
}
