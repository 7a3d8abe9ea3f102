//! coldsync integration test support
//!
//! Fixtures shared by the cross-crate scenarios in `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Local tree fixtures, data generators and engine helpers
pub mod test_utils;
