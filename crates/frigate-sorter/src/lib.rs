//! Frigate sorter: library crate behind the `frigate-sorter` binary.
//!
//! Re-exports all modules so the e2e test crate can drive the router,
//! scopes and subscription logic without a broker.

pub mod config;
pub mod handler;
pub mod handlers;
pub mod router;
pub mod scope;
pub mod subscriptions;
