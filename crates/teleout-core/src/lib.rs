//! Core of the teleout client: a single long-lived Telegram session that
//! routes `!commands` to handlers under rate and flood control.
//!
//! This crate is framework-agnostic. The Telegram library lives behind the
//! ports in [`messaging::port`], implemented in adapter crates.

pub mod auth;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod middleware;
pub mod presentation;
pub mod router;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
