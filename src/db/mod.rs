//! Database module for vanwatt.
//!
//! Provides SQLite storage with automatic migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
