//! Ivy Core - domain types and computations.
//!
//! This crate provides the parts of Ivy that do not touch the network or
//! the database:
//! - `admin` - Inventory / supplier order service (HTTP + SSE)
//! - `cli` - Command-line tools for migrations, syncs and price rules
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Everything here is deterministic and
//! unit tested in place.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, order status machine, metafield identity
//! - [`order`] - Supplier order line arithmetic and totals
//! - [`pricing`] - Price rule evaluation
//! - [`stats`] - Stock statistics and the size/color classifier
//! - [`progress`] - Progress events for long-running operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order;
pub mod pricing;
pub mod progress;
pub mod stats;
pub mod types;

pub use types::*;
