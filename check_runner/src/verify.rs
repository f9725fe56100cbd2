//! Assertion primitives for check bodies.
//!
//! These raise an [`AssertionFailure`] unwind payload, which the bounded
//! executor classifies separately from arbitrary faults: a failed
//! assertion means "wrong behavior", an arbitrary fault means "the program
//! crashed". Check bodies should use these instead of `assert!` so their
//! failure messages reach the transcript verbatim.

use std::fmt::Debug;
use std::panic::panic_any;

/// Unwind payload distinguishing an expressed expected-vs-actual mismatch
/// from an arbitrary runtime fault.
#[derive(Debug, Clone)]
pub struct AssertionFailure {
    pub message: String,
}

/// Fails the current check with `message`.
pub fn fail(message: impl Into<String>) -> ! {
    panic_any(AssertionFailure {
        message: message.into(),
    })
}

/// Fails the current check with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: &str) {
    if !condition {
        fail(message);
    }
}

/// Fails the current check unless `actual` equals `expected`, appending
/// both values to the check-supplied message.
pub fn ensure_eq<T: PartialEq + Debug>(expected: &T, actual: &T, message: &str) {
    if actual != expected {
        fail(format!("{message} (expected {expected:?}, got {actual:?})"));
    }
}
