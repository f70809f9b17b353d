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

pub use self::config::{JournalMode, SqliteConfig, DEFAULT_KEYSPACE};
pub use self::kv::SqliteKv;
pub use self::list::ListKeys;
pub use self::registry::SqliteStore;

mod config;
mod database;
mod error;
mod kv;
mod list;
mod pool;
mod registry;
mod transaction;
