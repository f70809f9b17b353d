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

//! The encoding of keys and keyspace names.
//!
//! Keys are stored as lowercase hex. Hex digits sort in the same order as the nibbles they encode,
//! and the encoding of a prefix is a prefix of the encoding, so comparing encoded keys gives the
//! same order as comparing the original bytes.

/// Encode a `key` for storage in the database.
pub(crate) fn encode_key(key: &[u8]) -> String {
    hex::encode(key)
}

/// Decode a key which was read back from the database.
///
/// # Panics
/// - The key was not produced by `encode_key`.
pub(crate) fn decode_key(encoded: &str) -> Vec<u8> {
    hex::decode(encoded).expect("Could not decode a stored key.")
}

/// The path of a keyspace, from the outermost namespace to the keyspace itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct KeyspacePath {
    segments: Vec<String>,
}

impl KeyspacePath {
    /// The path with no segments.
    pub fn root() -> Self {
        Self::default()
    }

    /// Return the path of `name` nested under this path.
    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Self { segments }
    }

    /// The name of the table which stores the keyspace at this path.
    ///
    /// Every segment is length-prefixed before the path is hex-encoded, so two distinct paths never
    /// share a table, and the name never contains anything but hex digits.
    pub fn table_name(&self) -> String {
        let mut bytes = Vec::new();
        for segment in &self.segments {
            bytes.extend_from_slice(&(segment.len() as u32).to_be_bytes());
            bytes.extend_from_slice(segment.as_bytes());
        }
        hex::encode(bytes)
    }
}
