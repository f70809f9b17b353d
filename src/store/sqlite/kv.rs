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

use std::sync::Arc;

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use static_assertions::assert_impl_all;
use tracing::trace;

use crate::store::key::encode_key;
use crate::store::{KeySet, KvStore};
use crate::{Context, Error, Operation};

use super::database::Database;
use super::list::ListKeys;
use super::transaction::with_transaction;

/// A handle to one keyspace of a [`SqliteStore`].
///
/// Handles are cheap to clone, and every handle from the same store shares its database.
///
/// [`SqliteStore`]: crate::store::SqliteStore
#[derive(Debug, Clone)]
pub struct SqliteKv {
    database: Arc<Database>,
    table: Arc<str>,
}

assert_impl_all!(SqliteKv: Send, Sync);

impl SqliteKv {
    pub(super) fn new(database: Arc<Database>, table: String) -> Self {
        Self {
            database,
            table: Arc::from(table),
        }
    }
}

impl KvStore for SqliteKv {
    type Keys = ListKeys;

    fn get(&self, ctx: &Context, key: &[u8]) -> crate::Result<Vec<u8>> {
        trace!(table = %self.table, key = %key.escape_ascii(), "get");

        let query = format!(r#"SELECT value, vsize FROM "{}" WHERE key = ?1;"#, self.table);
        let encoded = encode_key(key);

        let mut access = self.database.shared(ctx)?;
        let (data, size) = with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Deferred,
            Operation::Get,
            Some(key),
            |transaction| {
                let row: Option<(Vec<u8>, i64)> = transaction
                    .prepare_cached(&query)?
                    .query_row(params![encoded], |row| Ok((row.get(0)?, row.get(1)?)))
                    .optional()?;
                row.ok_or_else(|| Error::NotFound { key: key.to_vec() }.into())
            },
        )?;
        drop(access);

        self.database
            .compression()
            .decompress(&data, usize::try_from(size).unwrap_or(0))
            .map_err(|error| Error::internal(Operation::Get, Some(key), error))
    }

    fn put(&self, ctx: &Context, key: &[u8], data: &[u8], replace: bool) -> crate::Result<()> {
        trace!(table = %self.table, key = %key.escape_ascii(), size = data.len(), replace, "put");

        let verb = if replace { "REPLACE" } else { "INSERT" };
        let statement = format!(
            r#"{} INTO "{}" (key, value, vsize) VALUES (?1, ?2, ?3);"#,
            verb, self.table
        );
        let encoded = encode_key(key);
        let value = self
            .database
            .compression()
            .compress(data)
            .map_err(|error| Error::internal(Operation::Put, Some(key), error))?;

        let mut access = self.database.exclusive(ctx)?;
        with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Immediate,
            Operation::Put,
            Some(key),
            |transaction| {
                transaction
                    .prepare_cached(&statement)?
                    .execute(params![encoded, value, data.len() as i64])?;
                Ok(())
            },
        )
    }

    fn has<K: AsRef<[u8]>>(&self, ctx: &Context, keys: &[K]) -> crate::Result<KeySet> {
        trace!(table = %self.table, count = keys.len(), "has");

        let query = format!(r#"SELECT vsize FROM "{}" WHERE key = ?1;"#, self.table);

        let mut access = self.database.shared(ctx)?;
        with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Deferred,
            Operation::Has,
            None,
            |transaction| {
                let mut statement = transaction.prepare_cached(&query)?;
                let mut present = KeySet::new();
                for key in keys {
                    let key = key.as_ref();
                    let size: Option<i64> = statement
                        .query_row(params![encode_key(key)], |row| row.get(0))
                        .optional()?;
                    if size.is_some() {
                        present.insert(key.to_vec());
                    }
                }
                Ok(present)
            },
        )
    }

    fn size(&self, ctx: &Context, key: &[u8]) -> crate::Result<u64> {
        trace!(table = %self.table, key = %key.escape_ascii(), "size");

        let query = format!(r#"SELECT vsize FROM "{}" WHERE key = ?1;"#, self.table);
        let encoded = encode_key(key);

        let mut access = self.database.shared(ctx)?;
        with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Deferred,
            Operation::Size,
            Some(key),
            |transaction| {
                let size: Option<i64> = transaction
                    .prepare_cached(&query)?
                    .query_row(params![encoded], |row| row.get(0))
                    .optional()?;
                size.map(|size| size as u64)
                    .ok_or_else(|| Error::NotFound { key: key.to_vec() }.into())
            },
        )
    }

    fn delete(&self, ctx: &Context, key: &[u8]) -> crate::Result<()> {
        trace!(table = %self.table, key = %key.escape_ascii(), "delete");

        let statement = format!(r#"DELETE FROM "{}" WHERE key = ?1;"#, self.table);
        let encoded = encode_key(key);

        let mut access = self.database.exclusive(ctx)?;
        with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Immediate,
            Operation::Delete,
            Some(key),
            |transaction| {
                let deleted = transaction
                    .prepare_cached(&statement)?
                    .execute(params![encoded])?;
                if deleted == 0 {
                    return Err(Error::NotFound { key: key.to_vec() }.into());
                }
                Ok(())
            },
        )
    }

    fn list(&self, ctx: &Context, start: &[u8]) -> crate::Result<ListKeys> {
        trace!(table = %self.table, start = %start.escape_ascii(), "list");

        let access = self.database.shared(ctx)?;
        ListKeys::new(access, ctx.clone(), &self.table, start)
    }

    fn len(&self, ctx: &Context) -> crate::Result<u64> {
        trace!(table = %self.table, "len");

        let query = format!(r#"SELECT count(*) FROM "{}";"#, self.table);

        let mut access = self.database.shared(ctx)?;
        with_transaction(
            &mut access,
            ctx,
            TransactionBehavior::Deferred,
            Operation::Len,
            None,
            |transaction| {
                let count: i64 = transaction.query_row(&query, params![], |row| row.get(0))?;
                Ok(count as u64)
            },
        )
    }
}
