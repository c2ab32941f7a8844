//! Staff Composer WASM API
//!
//! This module provides the JavaScript-facing API for the staff composer.
//!
//! # Module Structure
//!
//! - `helpers`: Shared utilities for serialization, validation, error handling, and logging
//! - `composer`: The `Composer` class wrapping one staff controller

pub mod helpers;
pub mod composer;

pub use composer::Composer;
