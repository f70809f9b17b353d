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

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::{Context, Error, Operation};

use super::database::SharedAccess;
use super::error::translate;

/// An error which aborts a unit of work inside a transaction.
///
/// This lets a unit of work use `?` on both SQLite errors, which still need to be translated, and
/// store errors, which are passed through unchanged.
#[derive(Debug)]
pub(super) enum TxError {
    Sql(rusqlite::Error),
    Store(Error),
}

impl From<rusqlite::Error> for TxError {
    fn from(error: rusqlite::Error) -> Self {
        TxError::Sql(error)
    }
}

impl From<Error> for TxError {
    fn from(error: Error) -> Self {
        TxError::Store(error)
    }
}

/// Run `work` inside a transaction on `connection`.
///
/// If `work` succeeds, the transaction is committed and its result is returned. If `work` or the
/// commit fails, the transaction is rolled back and the error is returned. SQLite errors are
/// translated as having occurred while performing `op` on `key`.
pub(super) fn with_transaction<T, F>(
    connection: &mut Connection,
    ctx: &Context,
    behavior: TransactionBehavior,
    op: Operation,
    key: Option<&[u8]>,
    work: F,
) -> crate::Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, TxError>,
{
    let sql_error = |error: rusqlite::Error| translate(error, op, key, ctx);

    ctx.check()?;
    let transaction = connection
        .transaction_with_behavior(behavior)
        .map_err(sql_error)?;

    match work(&transaction) {
        Ok(value) => {
            transaction.commit().map_err(sql_error)?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = transaction.rollback() {
                warn!(%op, error = %rollback_error, "failed to roll back transaction");
            }
            Err(match error {
                TxError::Sql(error) => sql_error(error),
                TxError::Store(error) => error,
            })
        }
    }
}

/// A read transaction which owns its connection and its share of the store lock.
///
/// Unlike [`with_transaction`], this can outlive the call which started it, which is what a lazy
/// listing needs. The transaction is rolled back when this value is dropped without being
/// committed, and the connection and lock are released along with it.
#[derive(Debug)]
pub(super) struct ReadTransaction {
    access: Option<SharedAccess>,
}

impl ReadTransaction {
    /// Begin a deferred transaction on the connection in `access`.
    pub fn begin(access: SharedAccess) -> rusqlite::Result<Self> {
        access.execute_batch("BEGIN DEFERRED")?;
        Ok(Self {
            access: Some(access),
        })
    }

    pub fn connection(&self) -> &Connection {
        self.access
            .as_ref()
            .expect("The transaction was already finished.")
    }

    /// Commit the transaction and release the connection and lock.
    pub fn commit(mut self) -> rusqlite::Result<()> {
        let access = match self.access.take() {
            Some(access) => access,
            None => return Ok(()),
        };
        let result = access.execute_batch("COMMIT");
        if result.is_err() && !access.is_autocommit() {
            if let Err(error) = access.execute_batch("ROLLBACK") {
                warn!(%error, "failed to roll back read transaction");
            }
        }
        result
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        if let Some(access) = self.access.take() {
            if !access.is_autocommit() {
                if let Err(error) = access.execute_batch("ROLLBACK") {
                    warn!(%error, "failed to roll back read transaction");
                }
            }
        }
    }
}
