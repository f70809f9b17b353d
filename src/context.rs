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
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// The reason a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cancellation {
    /// The context was cancelled with [`Context::cancel`].
    Cancelled,

    /// The deadline of the context passed.
    DeadlineExceeded,
}

impl fmt::Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancellation::Cancelled => f.write_str("context cancelled"),
            Cancellation::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// A handle for cancelling store operations.
///
/// Every store operation accepts a `Context`. While an operation is waiting for the store lock,
/// waiting for a pooled connection, or executing a statement, it periodically checks whether its
/// context is done. If it is, the operation is aborted and returns [`Error::Cancelled`].
///
/// Contexts form a tree. A context derived with [`Context::child`], [`Context::with_timeout`],
/// or [`Context::with_deadline`] is done when its parent is done. Cancelling a child does not
/// cancel its parent.
///
/// Contexts are cheap to clone, and clones share their cancellation state.
///
/// [`Error::Cancelled`]: crate::Error::Cancelled
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// This is `None` for the background context, which can never be cancelled.
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// Return a context which is never done.
    pub fn background() -> Self {
        Self {
            token: None,
            deadline: None,
        }
    }

    /// Return a new child of this context which can be cancelled independently.
    pub fn child(&self) -> Self {
        self.derive(self.deadline)
    }

    /// Return a new child of this context which is done after `timeout` elapses.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Return a new child of this context which is done at `deadline`.
    ///
    /// If this context has an earlier deadline, the child keeps the earlier one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(inherited) => inherited.min(deadline),
            None => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let token = match &self.token {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            token: Some(token),
            deadline,
        }
    }

    /// Cancel this context and all of its children.
    ///
    /// Cancelling a background context does nothing.
    pub fn cancel(&self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
    }

    /// The deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The time left until the deadline of this context, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Return why this context is done, or `None` if it is not done.
    pub fn err(&self) -> Option<Cancellation> {
        match (&self.token, self.deadline) {
            (Some(token), _) if token.is_cancelled() => Some(Cancellation::Cancelled),
            (_, Some(deadline)) if Instant::now() >= deadline => {
                Some(Cancellation::DeadlineExceeded)
            }
            _ => None,
        }
    }

    /// Return whether this context is done.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Return `Err(Error::Cancelled)` if this context is done.
    pub fn check(&self) -> crate::Result<()> {
        match self.err() {
            Some(reason) => Err(crate::Error::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Whether this context can ever become done.
    pub(crate) fn is_cancellable(&self) -> bool {
        self.token.is_some()
    }
}
