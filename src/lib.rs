//! vanwatt - Power telemetry dashboard core.
//!
//! An append-only store of power-system readings behind a pin-gated HTTP
//! API, plus the polling coordinator that keeps a dashboard view in sync
//! with it.

pub mod auth;
pub mod codec;
pub mod config;
pub mod db;
pub mod retention;
pub mod sync;
pub mod web;
