// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error kinds for the fibra async runtime (spec §7).
//!
//! `FibraError` doubles as both the failure-channel payload of an
//! [`Outcome`](crate::Outcome) *and* the cancellation reason passed to
//! `cancel(reason)` — a cancel is simply a failure that a producer chooses
//! to deliver early. `Timeout` and `Interrupted` are ordinary variants of
//! this enum for exactly that reason.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

/// Root error type for all fibra operations (spec §7's error-kind table).
#[derive(Debug, thiserror::Error, Clone)]
pub enum FibraError {
    /// Normal end-of-iteration signal (spec: *Iteration-end*). Not a real
    /// error; [`AsyncIterator`](../fibra_iter/trait.AsyncIterator.html)
    /// terminals treat it as a control exception, never propagating it to
    /// callers as a failure.
    #[error("end of iteration")]
    End,

    /// `timeout(d)` elapsed before the wrapped action completed.
    #[error("timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Cooperative cancellation requested via `cancel(reason)`.
    #[error("cancelled: {reason}")]
    Cancelled { reason: Arc<str> },

    /// Blocking `sync()` was asked to stop waiting because its OS thread
    /// was interrupted.
    #[error("interrupted while waiting")]
    Interrupted,

    /// A user-supplied closure threw/returned an error. Stored behind an
    /// `Arc` (rather than thiserror's usual `Box`) so the whole
    /// `FibraError` stays cheaply cloneable, which the cancel-latch and
    /// bundle-trigger protocols both rely on.
    #[error("user code failed: {source}")]
    UserThrew { source: Arc<dyn std::error::Error + Send + Sync> },

    /// A bundle's success threshold became unreachable; carries every
    /// child failure collected so far as suppressed causes.
    #[error("success threshold unreachable: {failures_len} failing child(ren)")]
    OverLimit {
        failures_len: usize,
        failures: Arc<[FibraError]>,
    },

    /// A predicate returned a null-equivalent boolean where one was not
    /// permitted (misuse).
    #[error("predicate produced no usable result")]
    NullResult,

    /// A producer's `complete()` was called a second time (producer bug).
    #[error("promise already completed")]
    AlreadyCompleted,

    /// `finally_async`'s finalizer action itself failed; the original
    /// outcome that the finalizer was guarding is preserved as the source
    /// so it is never silently dropped (see SPEC_FULL.md open question).
    #[error("finalizer failed while guarding {original}: {finalizer_error}")]
    FinalizerFailed {
        finalizer_error: Arc<FibraError>,
        original: Arc<FinalizerOriginal>,
    },

    /// A `FiberLocal` (or `Fiber::current()`) was accessed from a thread
    /// that is not running as part of any fiber.
    #[error("accessed outside a running fiber")]
    NoCurrentFiber,
}

/// What `finally_async` was protecting when its finalizer failed.
#[derive(Debug, PartialEq)]
pub enum FinalizerOriginal {
    Success,
    Failure(FibraError),
}

impl fmt::Display for FinalizerOriginal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "a success"),
            Self::Failure(e) => write!(f, "a failure ({e})"),
        }
    }
}

impl FibraError {
    /// Build a [`Self::Cancelled`] from any displayable reason tag.
    pub fn cancelled(reason: impl Into<Arc<str>>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Build a [`Self::Timeout`] for the given duration.
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Wrap an arbitrary user error.
    pub fn user_threw(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::UserThrew {
            source: Arc::new(error),
        }
    }

    /// Build an [`Self::OverLimit`] from the failures collected so far.
    #[must_use]
    pub fn over_limit(failures: Vec<FibraError>) -> Self {
        Self::OverLimit {
            failures_len: failures.len(),
            failures: failures.into(),
        }
    }

    /// Build a [`Self::FinalizerFailed`], preserving whatever `finally_async`
    /// was guarding when its finalizer itself failed.
    #[must_use]
    pub fn finalizer_failed(finalizer_error: FibraError, original: FinalizerOriginal) -> Self {
        Self::FinalizerFailed {
            finalizer_error: Arc::new(finalizer_error),
            original: Arc::new(original),
        }
    }

    /// `true` if this is the distinguished end-of-iteration signal.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// `true` if this represents a cooperative cancellation (including
    /// timeouts and interruption, which are delivered as cancels).
    #[must_use]
    pub const fn is_cancel(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. } | Self::Timeout { .. } | Self::Interrupted
        )
    }
}

impl PartialEq for FibraError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::End, Self::End)
            | (Self::Interrupted, Self::Interrupted)
            | (Self::NullResult, Self::NullResult)
            | (Self::AlreadyCompleted, Self::AlreadyCompleted)
            | (Self::NoCurrentFiber, Self::NoCurrentFiber) => true,
            (Self::Timeout { duration: a }, Self::Timeout { duration: b }) => a == b,
            (Self::Cancelled { reason: a }, Self::Cancelled { reason: b }) => a == b,
            (Self::UserThrew { source: a }, Self::UserThrew { source: b }) => Arc::ptr_eq(a, b),
            (Self::OverLimit { failures: a, .. }, Self::OverLimit { failures: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (
                Self::FinalizerFailed {
                    finalizer_error: a,
                    original: oa,
                },
                Self::FinalizerFailed {
                    finalizer_error: b,
                    original: ob,
                },
            ) => a == b && oa == ob,
            _ => false,
        }
    }
}

/// Extension trait for converting arbitrary errors into [`FibraError`].
pub trait IntoFibraError {
    fn into_fibra_error(self) -> FibraError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoFibraError for E {
    fn into_fibra_error(self) -> FibraError {
        FibraError::user_threw(self)
    }
}

/// Adds `.context()`-free conversion helpers onto `Result<T, E>` so call
/// sites can funnel arbitrary errors into [`crate::Result`] with `?`.
pub trait ResultExt<T> {
    /// Convert the error channel into a [`FibraError::UserThrew`].
    fn into_fibra(self) -> crate::Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for core::result::Result<T, E> {
    fn into_fibra(self) -> crate::Result<T> {
        self.map_err(IntoFibraError::into_fibra_error)
    }
}
