use fibra_core::{FibraError, ResultExt};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("boom: {0}")]
struct Boom(String);

#[test]
fn cancelled_reasons_compare_by_content() {
    let a = FibraError::cancelled("E");
    let b = FibraError::cancelled("E");
    let c = FibraError::cancelled("F");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn timeout_carries_its_duration() {
    let err = FibraError::timeout(Duration::from_millis(10));
    match err {
        FibraError::Timeout { duration } => assert_eq!(duration, Duration::from_millis(10)),
        _ => panic!("expected Timeout"),
    }
}

#[test]
fn is_cancel_covers_timeout_and_interrupted() {
    assert!(FibraError::timeout(Duration::from_secs(1)).is_cancel());
    assert!(FibraError::Interrupted.is_cancel());
    assert!(FibraError::cancelled("x").is_cancel());
    assert!(!FibraError::End.is_cancel());
}

#[test]
fn user_errors_convert_with_into_fibra() {
    let result: Result<(), Boom> = Err(Boom("bad".into()));
    let converted = result.into_fibra();
    assert!(matches!(converted, Err(FibraError::UserThrew { .. })));
}

#[test]
fn over_limit_reports_failure_count() {
    let failures = vec![FibraError::cancelled("x"), FibraError::cancelled("y")];
    let err = FibraError::over_limit(failures);
    match err {
        FibraError::OverLimit { failures_len, .. } => assert_eq!(failures_len, 2),
        _ => panic!("expected OverLimit"),
    }
}
