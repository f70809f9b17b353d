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

//! Key-value blob stores.
//!
//! All stores implement the [`KvStore`] trait, which provides the primitive operations of a
//! byte-keyed blob store. Keys are arbitrary byte strings and values are opaque blobs.
//!
//! For each store, there is a corresponding type which provides the necessary configuration to
//! open that store. These config types implement [`OpenStore`].
//!
//! The SQLite backend is [`SqliteStore`]. One `SqliteStore` owns one database handle, and it hands
//! out a [`SqliteKv`] per keyspace. Every keyspace is stored in its own table, and every handle
//! derived from the same store shares the same connection pool and lock.
//!
//! [`KvStore`]: crate::store::KvStore
//! [`OpenStore`]: crate::store::OpenStore
//! [`SqliteStore`]: crate::store::SqliteStore
//! [`SqliteKv`]: crate::store::SqliteKv

pub use self::compression::Compression;
pub use self::kv_store::{KeySet, KvStore};
pub use self::open_store::OpenStore;
pub use self::sqlite::{
    JournalMode, ListKeys, SqliteConfig, SqliteKv, SqliteStore, DEFAULT_KEYSPACE,
};

mod compression;
mod key;
mod kv_store;
mod open_store;
mod sqlite;
