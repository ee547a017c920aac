//! Property-based tests for index lookup, delta application, and
//! signature round-tripping.
//!
//! Run with: `cargo test --test property`

mod delta_props;
mod idx_lookup;
