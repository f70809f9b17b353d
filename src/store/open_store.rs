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

/// A value which can be used to open a store.
pub trait OpenStore {
    /// The type of store which this value can be used to open.
    type Store;

    /// Open or create a store of type `Store`.
    ///
    /// This opens the store, creating it if it does not already exist.
    ///
    /// # Errors
    /// - `Error::InvalidConfig`: The configuration is invalid or does not match the existing
    /// store.
    /// - `Error::UnsupportedFormat`: The store is an unsupported format.
    /// - `Error::Internal`: The backing database could not be opened.
    fn open(&self) -> crate::Result<Self::Store>;
}
