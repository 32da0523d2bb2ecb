//! Validation catalog and built-in checks.

pub mod builtin;
pub mod registry;

pub use registry::{CatalogEntry, Validation, ValidationCatalog};
