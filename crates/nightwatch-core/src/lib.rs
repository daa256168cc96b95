//! Shared domain types, error taxonomy, retry policy and config loading for
//! the nightwatch surveillance pipeline.
//!
//! This crate is the single place every other `nightwatch-*` crate depends on
//! for the vocabulary of the domain (cameras, events, entities, provider
//! descriptors) so that no two crates invent their own copy of the same enum.

pub mod config;
pub mod error;
pub mod model;
pub mod retry;

pub use error::{Error, Result};
