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

use std::fmt::Debug;
use std::hash::Hash;

use spectral::{AssertionFailure, Spec};

use sqlite_blobstore::{Cancellation, Error};

/// An assertion which checks if a `sqlite_blobstore::Result` has the correct error variant.
pub trait ErrorVariantAssertions {
    fn is_err_variant(&self, expected_value: Error);

    /// Check that the result is an `Error::Cancelled` with the given `reason`.
    fn is_cancelled_by(&self, reason: Cancellation);
}

impl<'a, T> ErrorVariantAssertions for Spec<'a, sqlite_blobstore::Result<T>>
where
    T: Debug,
{
    fn is_err_variant(&self, expected_value: Error) {
        match self.subject {
            Ok(ref value) => {
                AssertionFailure::from_spec(self)
                    .with_expected(format!("Err({:?})", expected_value))
                    .with_actual(format!("Ok({:?})", value))
                    .fail();
            }

            Err(ref error) => {
                if std::mem::discriminant(error) != std::mem::discriminant(&expected_value) {
                    AssertionFailure::from_spec(self)
                        .with_expected(format!("Err({:?})", &expected_value))
                        .with_actual(format!("Err({:?})", error))
                        .fail();
                }
            }
        }
    }

    fn is_cancelled_by(&self, reason: Cancellation) {
        match self.subject {
            Err(Error::Cancelled(actual)) if *actual == reason => {}
            other => {
                AssertionFailure::from_spec(self)
                    .with_expected(format!("Err(Cancelled({:?}))", reason))
                    .with_actual(format!("{:?}", other))
                    .fail();
            }
        }
    }
}

/// Assert that two collections contain all the same elements, regardless of order.
pub fn assert_contains_all<T: Hash + Eq + Debug>(
    actual: impl IntoIterator<Item = T>,
    expected: impl IntoIterator<Item = T>,
) {
    assert_eq!(
        actual.into_iter().collect::<std::collections::HashSet<_>>(),
        expected
            .into_iter()
            .collect::<std::collections::HashSet<_>>()
    )
}
