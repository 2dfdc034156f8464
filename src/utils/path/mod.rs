//! Path utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `resolve_path`)
//! - [`walk`]: Sorted directory walks (`collect_files`, `try_collect_files`, `list_dirs`)

pub mod fs;
pub mod walk;

pub use fs::{normalize_path, resolve_path};
pub use walk::{collect_files, list_dirs, try_collect_files};
