//! Assertion helpers shared by store and service tests.

use quicktest_core::{ErrorKind, QuickTest, Result};
use std::fmt::Debug;

/// Assert that a record has been scrubbed: expired, no registrant.
///
/// # Panics
///
/// Panics if the record is not expired or still carries a person.
#[allow(clippy::panic)]
#[track_caller]
pub fn assert_scrubbed(quicktest: &QuickTest) {
    assert!(quicktest.expired, "expected quick test to be expired: {quicktest:?}");
    assert!(
        quicktest.person.is_none(),
        "expected quick test person to be unset: {quicktest:?}"
    );
}

/// Assert that a registered record is still live: not expired, registrant set.
///
/// # Panics
///
/// Panics if the record is expired or has no person.
#[allow(clippy::panic)]
#[track_caller]
pub fn assert_not_scrubbed(quicktest: &QuickTest) {
    assert!(!quicktest.expired, "expected quick test to not be expired: {quicktest:?}");
    assert!(
        quicktest.person.is_some(),
        "expected quick test person to be set: {quicktest:?}"
    );
}

/// Assert that `result` failed with the given kind.
///
/// # Panics
///
/// Panics if `result` succeeded or failed with another kind.
#[allow(clippy::panic)]
#[track_caller]
pub fn assert_error_kind<T: Debug>(result: &Result<T>, kind: ErrorKind) {
    match result {
        Err(err) => assert_eq!(err.kind(), kind, "expected {kind}, got {err}"),
        Ok(value) => panic!("expected {kind} error, got Ok({value:?})"),
    }
}
