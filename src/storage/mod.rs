//! On-disk snapshot management.

pub mod snapshot;
