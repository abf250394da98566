//! Configuration for the `prendr` tool
//!
//! Provides types and parsing for `prendr.toml` and sprite library files.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
