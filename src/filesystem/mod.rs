// src/filesystem/mod.rs

//! Filesystem helpers for the inventory
//!
//! Directory ownership checks, file name sanitization and safe joins for
//! materializing package manifests.

pub mod path;

pub use path::{
    find_non_existing_path, is_under, is_under_or_equals, make_valid_filename, normalize_path,
    path_equals, safe_join,
};
