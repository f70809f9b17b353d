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

use std::collections::BTreeSet;
use std::fmt;

use crate::{Context, Result};

/// A set of keys, ordered by their bytes.
pub type KeySet = BTreeSet<Vec<u8>>;

/// A persistent store which maps byte keys to blobs.
///
/// Every method accepts a [`Context`] which can be used to cancel the operation. If the context is
/// done before the operation completes, the method returns [`Error::Cancelled`] and the store is
/// left as if the operation never happened.
///
/// Implementations must be safe to share between threads. Every method takes `&self`.
///
/// [`Error::Cancelled`]: crate::Error::Cancelled
pub trait KvStore: fmt::Debug + Send + Sync {
    /// The iterator returned by [`KvStore::list`].
    type Keys: Iterator<Item = Result<Vec<u8>>>;

    /// Return the value stored under `key`.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value stored under `key`.
    /// - `Error::Cancelled`: The context was done before the value could be read.
    /// - `Error::Closed`: The store has been closed.
    /// - `Error::Internal`: The backing database failed.
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>>;

    /// Store `data` under `key`.
    ///
    /// If `replace` is `false` and a value is already stored under `key`, this fails and the
    /// stored value is left unchanged. If `replace` is `true`, any existing value is overwritten.
    ///
    /// This is an atomic operation.
    ///
    /// # Errors
    /// - `Error::AlreadyExists`: `replace` is `false` and `key` already exists.
    /// - `Error::Cancelled`: The context was done before the value could be written.
    /// - `Error::Closed`: The store has been closed.
    /// - `Error::Internal`: The backing database failed.
    fn put(&self, ctx: &Context, key: &[u8], data: &[u8], replace: bool) -> Result<()>;

    /// Return the subset of `keys` which exist in the store.
    ///
    /// Keys which don't exist are skipped.
    fn has<K: AsRef<[u8]>>(&self, ctx: &Context, keys: &[K]) -> Result<KeySet>;

    /// Return the size in bytes of the value stored under `key`.
    ///
    /// This is the size of the value as it was written, regardless of how it is stored.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value stored under `key`.
    fn size(&self, ctx: &Context, key: &[u8]) -> Result<u64>;

    /// Remove the value stored under `key`.
    ///
    /// This is an atomic operation.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value stored under `key`.
    fn delete(&self, ctx: &Context, key: &[u8]) -> Result<()>;

    /// Return an iterator over the keys in the store which are greater than or equal to `start`.
    ///
    /// Keys are returned in ascending order of their bytes. Passing an empty `start` lists every
    /// key. The iterator may be dropped at any time to stop early.
    fn list(&self, ctx: &Context, start: &[u8]) -> Result<Self::Keys>;

    /// Return the number of keys in the store.
    fn len(&self, ctx: &Context) -> Result<u64>;

    /// Return whether the store contains no keys.
    fn is_empty(&self, ctx: &Context) -> Result<bool> {
        Ok(self.len(ctx)? == 0)
    }
}
