//! Shared utilities.
//!
//! Hashing for artifact verification, plus helpers for tests that need fake
//! external tools.

pub mod hash;

#[cfg(test)]
pub mod testutil;
