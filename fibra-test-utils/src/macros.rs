// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Test macros.

/// Blocks on `handle` via `sync()`, panicking if it has not settled within
/// five seconds — a bound on tests that would otherwise hang forever on a
/// producer bug instead of failing fast.
#[macro_export]
macro_rules! with_timeout {
    ($handle:expr) => {
        $crate::with_timeout!($handle, std::time::Duration::from_secs(5))
    };
    ($handle:expr, $timeout:expr) => {{
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::sync::Arc::clone(&$handle);
        std::thread::spawn(move || {
            let outcome = fibra_async::sync(&handle);
            let _ = tx.send(outcome);
        });
        rx.recv_timeout($timeout)
            .expect("test timed out waiting for the action to settle")
    }};
}

#[cfg(test)]
mod tests {
    use fibra_async::Promise;

    #[test]
    fn with_timeout_returns_the_settled_outcome() {
        let promise = Promise::<i32>::pending();
        promise.succeed(5);
        let handle = promise.handle();
        let outcome = with_timeout!(handle);
        assert_eq!(outcome, Ok(5));
    }

    #[test]
    #[should_panic(expected = "timed out")]
    fn with_timeout_panics_if_it_never_settles() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        let _outcome = with_timeout!(handle, std::time::Duration::from_millis(20));
    }
}
