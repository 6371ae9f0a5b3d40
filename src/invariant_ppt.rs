//! Runtime invariants with contract-test support
//!
//! Production code states its invariants with [`assert_invariant!`]. Every
//! checked invariant is recorded per thread, so a test can drive a scenario
//! and then demand with [`contract_test`] that the invariants it cares about
//! were actually exercised rather than silently skipped.
//!
//! ```rust,ignore
//! use stockcam::invariant_ppt::{contract_test, contracts};
//!
//! #[test]
//! fn contract_sharpness_window() {
//!     let _ = stockcam::quality::evaluate(&frame, 220.0);
//!     contract_test("sharpness window", &[contracts::ANALYSIS_WINDOW_INSIDE]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;

/// Invariant messages used across the crate
pub mod contracts {
    pub const ANALYSIS_WINDOW_INSIDE: &str = "Sharpness window lies inside the image";
    pub const MACRO_CROP_INSIDE: &str = "Macro crop lies inside the active array";
    pub const IN_FLIGHT_NON_NEGATIVE: &str = "In-flight capture count never drops below zero";
    pub const SCAN_PHOTO_PRESENT: &str = "Accepted item starts with its scan photo";
}

thread_local! {
    static CHECKED: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked
///
/// Panics with the message and optional context when the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        checked.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        log::error!("Invariant violated in {}: {}", ctx, message);
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Whether `message` has been checked on this thread
pub fn was_checked(message: &str) -> bool {
    CHECKED.with(|checked| checked.borrow().contains(message))
}

/// Panic unless every invariant in `required` was checked on this thread
pub fn contract_test(test_name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|message| !was_checked(message))
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
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
