//! Shared test utilities for the catalog middleware workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-memory fetch port with a request log
//! - Synthetic catalog trees of known shape
//! - Scripted connector adapters
//! - Common test fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{two_branch_catalog, MockFetcher};
//! ```

pub mod fetcher;
pub mod fixtures;
pub mod generators;
pub mod stubs;

// Re-export commonly used items at the crate root
pub use fetcher::MockFetcher;
pub use fixtures::*;
pub use generators::*;
pub use stubs::StubAdapter;

/// Write `contents` to a temporary file and return its handle.
///
/// The file is removed when the handle is dropped.
pub fn temp_file_with(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .unwrap_or_else(|e| panic!("failed to create temp file: {}", e));
    file.write_all(contents.as_bytes())
        .unwrap_or_else(|e| panic!("failed to write temp file: {}", e));
    file
}

/// Assert that a list of items has exactly the given ids, in order.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_item_ids;
///
/// assert_item_ids!(outcome.items, ["near"]);
/// ```
#[macro_export]
macro_rules! assert_item_ids {
    ($items:expr, [$($id:expr),* $(,)?]) => {{
        let actual: Vec<&str> = $items.iter().map(|item| item.id.as_str()).collect();
        let expected: Vec<&str> = vec![$($id),*];
        assert_eq!(actual, expected, "item ids differ");
    }};
}

/// Assert that a list of items has the given ids, in any order.
#[macro_export]
macro_rules! assert_item_ids_unordered {
    ($items:expr, [$($id:expr),* $(,)?]) => {{
        let mut actual: Vec<&str> = $items.iter().map(|item| item.id.as_str()).collect();
        let mut expected: Vec<&str> = vec![$($id),*];
        actual.sort_unstable();
        expected.sort_unstable();
        assert_eq!(actual, expected, "item ids differ");
    }};
}
