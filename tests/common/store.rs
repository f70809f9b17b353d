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
use std::path::{Path, PathBuf};

use rstest::*;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use sqlite_blobstore::store::{Compression, OpenStore, SqliteConfig, SqliteKv, SqliteStore};
use sqlite_blobstore::Context;

/// A value which is tied to the lifetime of a temporary directory.
pub struct WithTempDir<T> {
    directory: TempDir,
    value: T,
}

impl<T> WithTempDir<T> {
    /// The path of the temporary directory.
    pub fn directory(&self) -> &Path {
        self.directory.path()
    }

    /// Replace the value, keeping the directory alive.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithTempDir<U> {
        WithTempDir {
            directory: self.directory,
            value: f(self.value),
        }
    }

    pub fn into_inner(self) -> (TempDir, T) {
        (self.directory, self.value)
    }
}

impl<T> Deref for WithTempDir<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for WithTempDir<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

/// Send log output to the test harness. Set `RUST_LOG` to see it.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The path of the database file in `directory`.
pub fn database_path(directory: &Path) -> PathBuf {
    directory.join("store.db")
}

/// A config for a fresh database in a temporary directory.
#[fixture]
pub fn config(
    #[default(Compression::None)] compression: Compression,
) -> WithTempDir<SqliteConfig> {
    init_logging();
    let directory = tempfile::tempdir().unwrap();
    let mut config = SqliteConfig::new(database_path(directory.path()));
    config.compression = compression;
    WithTempDir {
        directory,
        value: config,
    }
}

/// A fresh store in a temporary directory.
#[fixture]
pub fn sqlite_store(
    #[default(Compression::None)] compression: Compression,
) -> WithTempDir<SqliteStore> {
    config(compression).map(|config| config.open().unwrap())
}

/// The default keyspace of a fresh store.
#[fixture]
pub fn kv(
    #[default(Compression::None)] compression: Compression,
) -> WithTempDir<SqliteKv> {
    sqlite_store(compression).map(|store| store.root(&Context::background()).unwrap())
}
