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

//! `sqlite-blobstore` is a transactional, namespaced key-value blob store backed by SQLite.
//!
//! This crate maps a small byte-oriented storage contract (get, put, has, delete, list, len,
//! close) onto a SQLite database. It provides the following features:
//! - Transparent compression of values
//! - Namespaced keyspaces which share one database handle and connection pool
//! - Safe concurrent access from many threads
//! - Strict key-existence semantics (insert vs. replace, not found vs. already exists)
//! - Cancellation of blocked or in-flight operations through a [`Context`]
//!
//! A store is opened from a [`SqliteConfig`], which produces a [`SqliteStore`]. The store hands
//! out [`SqliteKv`] handles, one per keyspace, which implement the [`KvStore`] trait.
//!
//! # Examples
//! ```
//! use sqlite_blobstore::store::{KvStore, OpenStore, SqliteConfig};
//! use sqlite_blobstore::Context;
//!
//! fn main() -> sqlite_blobstore::Result<()> {
//!     let directory = tempfile::tempdir().unwrap();
//!     let store = SqliteConfig::new(directory.path().join("store.db")).open()?;
//!     let ctx = Context::background();
//!
//!     // Get a handle to the default keyspace.
//!     let kv = store.root(&ctx)?;
//!
//!     kv.put(&ctx, b"alpha", b"hello", false)?;
//!     assert_eq!(kv.get(&ctx, b"alpha")?, b"hello");
//!
//!     // Inserting an existing key without replacing it fails.
//!     assert!(kv.put(&ctx, b"alpha", b"world", false).unwrap_err().is_already_exists());
//!     kv.put(&ctx, b"alpha", b"world", true)?;
//!     assert_eq!(kv.get(&ctx, b"alpha")?, b"world");
//!
//!     store.close(&ctx)
//! }
//! ```
//!
//! # Features
//! Some functionality is gated behind cargo features:
//!
//! Type | Cargo Feature
//! --- | ---
//! `Compression::Lz4` | `compression` (enabled by default)
//!
//! [`SqliteConfig`]: crate::store::SqliteConfig
//! [`SqliteStore`]: crate::store::SqliteStore
//! [`SqliteKv`]: crate::store::SqliteKv
//! [`KvStore`]: crate::store::KvStore

pub use context::{Cancellation, Context};
pub use error::{CloseError, CloseStep, Error, Operation, Result};

mod context;
mod error;
pub mod store;
