// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The timeout node (spec §4.4): races a source action against a delayed
//! alarm on a [`Runtime`], cancelling the source with a distinguished
//! [`FibraError::Timeout`] if the alarm wins.

use std::time::Duration;

use fibra_core::FibraError;
use fibra_runtime::{Runtime, Timer};

use crate::promise::{Async, AsyncHandle, Promise};

/// Wrap `source` so it fails with [`FibraError::Timeout`] if it has not
/// settled within `duration`. The alarm itself runs on `Rt`'s spawn/timer
/// primitives; cancellation of `source` is best-effort cooperative, the
/// same as any other `cancel(reason)` call.
pub fn timeout<Rt, T>(source: AsyncHandle<T>, duration: Duration) -> AsyncHandle<T>
where
    Rt: Runtime,
    T: Clone + Send + Sync + 'static,
{
    let next = Promise::<T>::pending();
    let handle = next.handle();

    let alarm_promise = next.clone();
    let alarm_source = source.clone();
    Rt::spawn(async move {
        let timer = Rt::Timer::default();
        timer.sleep_future(duration).await;
        if alarm_promise.complete(Err(FibraError::timeout(duration))) {
            alarm_source.cancel(FibraError::timeout(duration));
        }
    });

    source.subscribe(Box::new(move |outcome| {
        next.complete(outcome);
    }));

    handle
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use crate::promise::sync;
    use fibra_runtime::impls::tokio::TokioRuntime;

    // `sync()` blocks its calling thread, so these need a multi-thread
    // runtime: the timeout alarm is spawned separately and must be polled
    // by another worker while this test thread is parked in `sync()`.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn source_completing_first_wins() {
        let promise = Promise::<i32>::pending();
        let wrapped = timeout::<TokioRuntime, _>(promise.handle(), Duration::from_millis(200));
        promise.succeed(5);
        assert_eq!(sync(&wrapped), Ok(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn alarm_firing_first_produces_a_timeout_error() {
        let promise = Promise::<i32>::pending();
        let wrapped = timeout::<TokioRuntime, _>(promise.handle(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            sync(&wrapped),
            Err(FibraError::timeout(Duration::from_millis(10)))
        );
    }
}
