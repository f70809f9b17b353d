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

use std::ops::{Deref, DerefMut};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::{Context, Error, Operation};

use super::config::JournalMode;

/// How long a blocked caller sleeps before checking whether its context is done.
pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The number of virtual machine instructions between checks for cancellation.
const PROGRESS_INTERVAL: i32 = 1_000;

/// The options used to open each connection in a [`Pool`].
#[derive(Debug)]
pub(super) struct ConnectionOptions {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub journal_mode: Option<JournalMode>,
}

impl ConnectionOptions {
    fn connect(&self) -> crate::Result<Connection> {
        let open = |error: rusqlite::Error| Error::internal(Operation::Open, None, error);

        let connection =
            Connection::open_with_flags(&self.path, OpenFlags::default()).map_err(open)?;
        connection.busy_timeout(self.busy_timeout).map_err(open)?;

        if let Some(mode) = self.journal_mode {
            let actual: String = connection
                .pragma_update_and_check(None, "journal_mode", mode.pragma_value(), |row| {
                    row.get(0)
                })
                .map_err(open)?;
            if !actual.eq_ignore_ascii_case(mode.pragma_value()) {
                return Err(Error::InvalidConfig(format!(
                    "The database does not support journal mode '{}' (it is using '{}').",
                    mode.pragma_value(),
                    actual
                )));
            }
        }

        Ok(connection)
    }
}

#[derive(Debug)]
struct PoolState {
    idle: Vec<Connection>,
    /// The number of connections which are open, whether idle or checked out.
    open: usize,
    closed: bool,
}

#[derive(Debug)]
struct PoolShared {
    state: Mutex<PoolState>,
    available: Condvar,
    max_size: usize,
    options: ConnectionOptions,
}

/// A bounded pool of connections to one database.
///
/// Connections are opened lazily, up to `max_size`. When every connection is checked out, callers
/// wait for one to be returned.
#[derive(Debug, Clone)]
pub(super) struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    pub fn new(options: ConnectionOptions, max_size: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    idle: Vec::with_capacity(max_size),
                    open: 0,
                    closed: false,
                }),
                available: Condvar::new(),
                max_size,
                options,
            }),
        }
    }

    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Check out a connection, waiting until one is available or `ctx` is done.
    ///
    /// Statements executed on the returned connection are interrupted once `ctx` is done.
    ///
    /// # Errors
    /// - `Error::Closed`: The pool has been closed.
    /// - `Error::Cancelled`: `ctx` was done before a connection became available.
    pub fn acquire(&self, ctx: &Context) -> crate::Result<PooledConnection> {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return Err(Error::Closed);
            }

            if let Some(connection) = state.idle.pop() {
                drop(state);
                return Ok(PooledConnection::new(connection, &self.shared, ctx));
            }

            if state.open < self.shared.max_size {
                state.open += 1;
                let open = state.open;
                drop(state);

                return match self.shared.options.connect() {
                    Ok(connection) => {
                        debug!(open, max = self.shared.max_size, "opened pooled connection");
                        Ok(PooledConnection::new(connection, &self.shared, ctx))
                    }
                    Err(error) => {
                        self.shared.state.lock().open -= 1;
                        self.shared.available.notify_one();
                        Err(error)
                    }
                };
            }

            ctx.check()?;
            if ctx.is_cancellable() {
                let timeout = ctx
                    .remaining()
                    .map_or(POLL_INTERVAL, |remaining| remaining.min(POLL_INTERVAL));
                self.shared.available.wait_for(&mut state, timeout);
            } else {
                self.shared.available.wait(&mut state);
            }
        }
    }

    /// Close every idle connection and refuse to hand out any more.
    ///
    /// Connections which are checked out are closed when they are returned. This returns the
    /// errors from connections which failed to close.
    pub fn close(&self) -> Vec<anyhow::Error> {
        let idle = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.open -= state.idle.len();
            std::mem::take(&mut state.idle)
        };
        self.shared.available.notify_all();

        idle.into_iter()
            .filter_map(|connection| connection.close().err())
            .map(|(_, error)| anyhow::Error::from(error))
            .collect()
    }
}

/// A connection checked out of a [`Pool`].
///
/// The connection is returned to the pool when this value is dropped.
#[derive(Debug)]
pub(super) struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<PoolShared>,
}

impl PooledConnection {
    fn new(connection: Connection, pool: &Arc<PoolShared>, ctx: &Context) -> Self {
        if ctx.is_cancellable() {
            // The handler only reads the cancellation state, which a panic can't leave torn.
            let ctx = AssertUnwindSafe(ctx.clone());
            connection.progress_handler(PROGRESS_INTERVAL, Some(move || (*ctx).is_done()));
        }
        Self {
            connection: Some(connection),
            pool: Arc::clone(pool),
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("The connection was already returned to the pool.")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("The connection was already returned to the pool.")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => return,
        };

        // The handler holds the context of the caller which checked this connection out.
        connection.progress_handler(0, None::<fn() -> bool>);

        let mut state = self.pool.state.lock();
        if state.closed {
            state.open -= 1;
            drop(state);
            if let Err((_, error)) = connection.close() {
                warn!(%error, "failed to close a connection returned after the pool closed");
            }
        } else {
            state.idle.push(connection);
            drop(state);
            self.pool.available.notify_one();
        }
    }
}
