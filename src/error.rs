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

use std::fmt;
use std::result;

use thiserror::Error as DeriveError;

use crate::context::Cancellation;

/// An operation performed against a store.
///
/// This is attached to errors to say what the store was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    /// Opening the database and checking its format.
    Open,

    /// Creating the table for a keyspace.
    CreateKeyspace,

    /// Reading a value.
    Get,

    /// Checking which keys exist.
    Has,

    /// Reading the size of a value.
    Size,

    /// Writing a value.
    Put,

    /// Removing a value.
    Delete,

    /// Listing keys.
    List,

    /// Counting keys.
    Len,

    /// Closing the database.
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open",
            Operation::CreateKeyspace => "create keyspace",
            Operation::Get => "get",
            Operation::Has => "has",
            Operation::Size => "size",
            Operation::Put => "put",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Len => "len",
            Operation::Close => "close",
        };
        f.write_str(name)
    }
}

/// The error type for operations with a store.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// The requested key does not exist.
    #[error("Key not found: {}", .key.escape_ascii())]
    NotFound { key: Vec<u8> },

    /// A value was inserted without replacement under a key which already exists.
    #[error("Key already exists: {}", .key.escape_ascii())]
    AlreadyExists { key: Vec<u8> },

    /// The operation was cancelled or its deadline passed before it could complete.
    #[error("The operation was cancelled: {0}")]
    Cancelled(Cancellation),

    /// The store configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// This database format is not supported by this version of the library.
    #[error("This database format is not supported by this version of the library.")]
    UnsupportedFormat,

    /// The store has been closed.
    #[error("The store has been closed.")]
    Closed,

    /// The backing database failed.
    #[error("The {op} operation failed{}: {source}", KeySuffix(.key.as_deref()))]
    Internal {
        op: Operation,
        key: Option<Vec<u8>>,
        #[source]
        source: anyhow::Error,
    },

    /// One or more steps of closing the store failed.
    #[error(transparent)]
    Close(#[from] CloseError),
}

impl Error {
    /// Return whether this is an [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Return whether this is an [`Error::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Return whether this is an [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    pub(crate) fn internal(
        op: Operation,
        key: Option<&[u8]>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Error::Internal {
            op,
            key: key.map(<[u8]>::to_vec),
            source: source.into(),
        }
    }
}

struct KeySuffix<'a>(Option<&'a [u8]>);

impl fmt::Display for KeySuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(key) => write!(f, " for key {}", key.escape_ascii()),
            None => Ok(()),
        }
    }
}

/// A step of closing a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseStep {
    /// Truncating the write-ahead log.
    Checkpoint,

    /// Reclaiming unused space in the database file.
    Vacuum,

    /// Closing the pooled connections.
    Release,
}

impl fmt::Display for CloseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseStep::Checkpoint => f.write_str("checkpoint"),
            CloseStep::Vacuum => f.write_str("vacuum"),
            CloseStep::Release => f.write_str("release"),
        }
    }
}

/// Every failure which occurred while closing a store.
///
/// Closing a store does not stop at the first failure, so this collects all of them.
#[derive(Debug)]
pub struct CloseError {
    failures: Vec<(CloseStep, anyhow::Error)>,
}

impl CloseError {
    pub(crate) fn new(failures: Vec<(CloseStep, anyhow::Error)>) -> Self {
        Self { failures }
    }

    /// The steps which failed along with their errors, in the order they were attempted.
    pub fn failures(&self) -> &[(CloseStep, anyhow::Error)] {
        &self.failures
    }

    /// Return whether the given `step` failed.
    pub fn failed(&self, step: CloseStep) -> bool {
        self.failures.iter().any(|(failed, _)| *failed == step)
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Failed to close the store")?;
        for (i, (step, error)) in self.failures.iter().enumerate() {
            let separator = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}: {}", separator, step, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let (_, error) = self.failures.first()?;
        let source: &(dyn std::error::Error + 'static) = &**error;
        Some(source)
    }
}

/// The result type for operations with a store.
pub type Result<T> = result::Result<T, Error>;
