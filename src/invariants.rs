//! Runtime invariants with a contract log.
//!
//! Production code states its invariants with [`assert_invariant!`]; every
//! checked message is recorded per thread so tests can assert that a code path
//! actually exercised the invariants it promises.
//!
//! ```rust,ignore
//! use crabcapture::invariants::*;
//!
//! assert_invariant!(
//!     refreshed_count + stale.len() == checked.len(),
//!     "Every checked kind is refreshed or reported stale"
//! );
//!
//! #[test]
//! fn contract_settings_write() {
//!     contract_test("settings write", &["Every checked kind is refreshed or reported stale"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record it in the contract log.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariants::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariants::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Panics unless every message in `required_invariants` was checked on this
/// thread since the last [`clear_invariant_log`].
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariants_satisfy_contract() {
        clear_invariant_log();
        assert_invariant!(1 + 1 == 2, "arithmetic holds");
        contract_test("arithmetic", &["arithmetic holds"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [unit]: never true")]
    fn test_violation_panics_with_context() {
        assert_invariant!(false, "never true", "unit");
    }

    #[test]
    #[should_panic(expected = "invariants never checked")]
    fn test_unchecked_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("empty", &["not exercised"]);
    }
}
