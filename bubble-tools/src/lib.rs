//! Shared plumbing for the `bubble_sizes`, `size_hist` and `variance_table`
//! binaries.

pub mod shared_args;
