pub mod config;

// Test helpers are compiled for test builds and for downstream crates that
// opt in via the `test-helpers` feature.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{
    generate_unique_id, generate_unique_user, get_test_database_url,
    get_test_in_memory_database_url,
};
