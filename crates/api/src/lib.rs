//! Pharma Link account service library.
//!
//! Provisioning, authentication and deactivation of pharmacy, company and
//! administrator accounts, exposed as a library so the CLI and the
//! integration tests can reuse it.
//!
//! Enable the `test-support` feature for the in-memory store implementations
//! in [`services::accounts::memory`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
