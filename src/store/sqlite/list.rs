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

use std::collections::VecDeque;

use rusqlite::params;

use crate::store::key::{decode_key, encode_key};
use crate::{Context, Operation};

use super::database::SharedAccess;
use super::error::translate;
use super::transaction::ReadTransaction;

/// The number of keys fetched from the database at a time.
const BATCH_SIZE: usize = 256;

/// Where the next batch of keys starts.
#[derive(Debug)]
enum Position {
    /// At this encoded key, inclusive.
    From(String),
    /// Just past this encoded key.
    After(String),
}

/// An iterator over the keys in a keyspace, in ascending byte order.
///
/// This is returned by [`SqliteKv::list`]. Keys are fetched lazily in batches, all within a
/// single read transaction, so the listing is a consistent snapshot of the keyspace.
///
/// While it is alive, this holds a connection and a shared lock on the store, which blocks every
/// writer. The lock is released as soon as the last key has been fetched from the database or
/// the iterator is dropped, whichever comes first, so dropping it early stops the listing.
///
/// If an error occurs, it is returned once and the iterator ends.
///
/// [`SqliteKv::list`]: crate::store::KvStore::list
#[derive(Debug)]
pub struct ListKeys {
    transaction: Option<ReadTransaction>,
    ctx: Context,
    query_from: String,
    query_after: String,
    position: Position,
    buffer: VecDeque<String>,
}

impl ListKeys {
    pub(super) fn new(
        access: SharedAccess,
        ctx: Context,
        table: &str,
        start: &[u8],
    ) -> crate::Result<Self> {
        ctx.check()?;
        let transaction = ReadTransaction::begin(access)
            .map_err(|error| translate(error, Operation::List, None, &ctx))?;

        Ok(Self {
            transaction: Some(transaction),
            query_from: format!(
                r#"SELECT key FROM "{}" WHERE key >= ?1 ORDER BY key LIMIT ?2;"#,
                table
            ),
            query_after: format!(
                r#"SELECT key FROM "{}" WHERE key > ?1 ORDER BY key LIMIT ?2;"#,
                table
            ),
            position: Position::From(encode_key(start)),
            buffer: VecDeque::new(),
            ctx,
        })
    }

    /// Fetch the next batch of keys into the buffer.
    ///
    /// Once the database has no more keys to give, the transaction is committed and released.
    fn fetch(&mut self) -> crate::Result<()> {
        let transaction = match &self.transaction {
            Some(transaction) => transaction,
            None => return Ok(()),
        };

        self.ctx.check()?;

        let (query, position) = match &self.position {
            Position::From(key) => (&self.query_from, key),
            Position::After(key) => (&self.query_after, key),
        };

        let batch = transaction
            .connection()
            .prepare_cached(query)
            .and_then(|mut statement| {
                let keys = statement
                    .query_map(params![position, BATCH_SIZE as i64], |row| row.get(0))?
                    .collect::<rusqlite::Result<VecDeque<String>>>()?;
                Ok(keys)
            })
            .map_err(|error| translate(error, Operation::List, None, &self.ctx))?;

        if let Some(last) = batch.back() {
            self.position = Position::After(last.clone());
        }

        if batch.len() < BATCH_SIZE {
            if let Some(transaction) = self.transaction.take() {
                transaction
                    .commit()
                    .map_err(|error| translate(error, Operation::List, None, &self.ctx))?;
            }
        }

        self.buffer = batch;
        Ok(())
    }
}

impl Iterator for ListKeys {
    type Item = crate::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if let Err(error) = self.fetch() {
                self.transaction = None;
                self.buffer.clear();
                return Some(Err(error));
            }
        }

        self.buffer.pop_front().map(|key| Ok(decode_key(&key)))
    }
}

