//! Shared domain types for the tally dashboard client.
//!
//! Pure data definitions and derived math (pagination windows, filter
//! counter selection). No I/O lives here; the gateway and sync crates
//! build on these types.

pub mod job;
pub mod pagination;
pub mod transaction;
pub mod types;
pub mod user;
