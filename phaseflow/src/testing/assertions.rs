//! Test assertions for outcomes.

use crate::core::Outcome;

/// Asserts that the outcome carries no blocking fail.
pub fn assert_outcome_succeeded<T>(outcome: &Outcome<T>) {
    assert!(
        outcome.is_success(),
        "Expected success, got fails: {:?}",
        outcome.fails
    );
}

/// Asserts that the outcome carries at least one blocking fail.
pub fn assert_outcome_failed<T>(outcome: &Outcome<T>) {
    assert!(
        outcome.is_failure(),
        "Expected failure, got fails: {:?}",
        outcome.fails
    );
}

/// Asserts that the outcome carries a fail with `mnemonic`.
pub fn assert_has_fail<T>(outcome: &Outcome<T>, mnemonic: &str) {
    assert!(
        outcome.has_fail(mnemonic),
        "Expected fail '{}', got: {:?}",
        mnemonic,
        outcome.fails.iter().map(|f| &f.mnemonic).collect::<Vec<_>>()
    );
}
