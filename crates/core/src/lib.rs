//! Pharma Link Core - Shared types library.
//!
//! This crate provides common types used across all Pharma Link components:
//! - `api` - Account lifecycle service (provisioning, login, deactivation)
//! - `cli` - Command-line tools for migrations and administrator bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and predicates - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and account roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
