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

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{Compression, OpenStore};

use super::registry::SqliteStore;

/// The name of the keyspace returned by [`SqliteStore::root`].
pub const DEFAULT_KEYSPACE: &str = "blobs";

/// The busy timeout used by default, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn default_keyspace() -> String {
    String::from(DEFAULT_KEYSPACE)
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// A SQLite journal mode.
///
/// This controls how the database journals writes. See the SQLite documentation for
/// `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    /// Returns the SQLite pragma value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Persist => "persist",
            Self::Memory => "memory",
            Self::Wal => "wal",
            Self::Off => "off",
        }
    }
}

/// The configuration for opening a [`SqliteStore`].
///
/// [`SqliteStore`]: crate::store::SqliteStore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// The path of the SQLite database file.
    ///
    /// This may also be a `file:` URI.
    pub path: PathBuf,

    /// The maximum number of open connections.
    ///
    /// If this is `None`, the number of CPUs is used.
    #[serde(default)]
    pub pool_size: Option<usize>,

    /// The method used to compress values.
    ///
    /// This must match the method the database was created with.
    #[serde(default)]
    pub compression: Compression,

    /// The name of the keyspace returned by [`SqliteStore::root`].
    ///
    /// [`SqliteStore::root`]: crate::store::SqliteStore::root
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// The journal mode to set on every connection, if any.
    #[serde(default)]
    pub journal_mode: Option<JournalMode>,

    /// How long a connection waits on a database locked by another process, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteConfig {
    /// Return a config for a database at `path` with default options.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool_size: None,
            compression: Compression::default(),
            keyspace: default_keyspace(),
            journal_mode: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Use `keyspace` as the name of the default keyspace.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    pub fn with_journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = Some(journal_mode);
        self
    }

    /// Wait up to `timeout` on a database locked by another process.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// The number of connections the pool may open.
    pub(crate) fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(num_cpus::get).max(1)
    }

    pub(crate) fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Check that this config is well-formed.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig(String::from(
                "The database path is empty.",
            )));
        }
        if self.pool_size == Some(0) {
            return Err(crate::Error::InvalidConfig(String::from(
                "The pool size must be greater than zero.",
            )));
        }
        if let Some(problem) = self.compression.validate() {
            return Err(crate::Error::InvalidConfig(problem));
        }
        Ok(())
    }
}

impl OpenStore for SqliteConfig {
    type Store = SqliteStore;

    fn open(&self) -> crate::Result<Self::Store> {
        SqliteStore::new(self)
    }
}
