//! Core types for Ivy.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod metafield;
pub mod status;

pub use id::*;
pub use metafield::{MetafieldKey, MetafieldSet, VariantMetafield};
pub use status::{InvalidTransition, SupplierOrderStatus};
