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

//! The translation of SQLite errors into store errors.
//!
//! This is the only place which looks at SQLite error codes.

use std::os::raw::c_int;

use rusqlite::{ffi, ErrorCode};

use crate::{Cancellation, Context, Error, Operation};

/// Return whether an extended result code means a uniqueness constraint was violated.
const fn is_uniqueness_violation(extended_code: c_int) -> bool {
    extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        || extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
}

/// Translate a SQLite `error` which occurred while performing `op` on `key`.
///
/// - An interrupted statement becomes `Error::Cancelled`, since statements are only interrupted
/// when `ctx` is done.
/// - A uniqueness violation becomes `Error::AlreadyExists` for `key`.
/// - Everything else becomes `Error::Internal`.
pub(super) fn translate(
    error: rusqlite::Error,
    op: Operation,
    key: Option<&[u8]>,
    ctx: &Context,
) -> Error {
    match &error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ErrorCode::OperationInterrupted,
                ..
            },
            _,
        ) => Error::Cancelled(ctx.err().unwrap_or(Cancellation::Cancelled)),
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ErrorCode::ConstraintViolation,
                extended_code,
            },
            _,
        ) if is_uniqueness_violation(*extended_code) => match key {
            Some(key) => Error::AlreadyExists { key: key.to_vec() },
            None => Error::internal(op, None, error),
        },
        _ => Error::internal(op, key, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: ErrorCode, extended_code: c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error { code, extended_code }, None)
    }

    #[test]
    fn primary_key_violation_is_already_exists() {
        let error = translate(
            failure(ErrorCode::ConstraintViolation, ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            Operation::Put,
            Some(b"alpha"),
            &Context::background(),
        );
        assert!(matches!(error, Error::AlreadyExists { key } if key == b"alpha"));
    }

    #[test]
    fn other_constraint_violation_is_internal() {
        let error = translate(
            failure(ErrorCode::ConstraintViolation, ffi::SQLITE_CONSTRAINT_NOTNULL),
            Operation::Put,
            Some(b"alpha"),
            &Context::background(),
        );
        assert!(matches!(error, Error::Internal { op: Operation::Put, .. }));
    }

    #[test]
    fn interrupt_is_cancelled() {
        let ctx = Context::background().child();
        ctx.cancel();
        let error = translate(
            failure(ErrorCode::OperationInterrupted, ffi::SQLITE_INTERRUPT),
            Operation::Get,
            Some(b"alpha"),
            &ctx,
        );
        assert!(matches!(error, Error::Cancelled(Cancellation::Cancelled)));
    }

    #[test]
    fn other_errors_keep_context() {
        let error = translate(
            rusqlite::Error::QueryReturnedNoRows,
            Operation::Len,
            None,
            &Context::background(),
        );
        assert!(matches!(error, Error::Internal { op: Operation::Len, key: None, .. }));
    }
}
