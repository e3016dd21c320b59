//! Core types and trait definitions for the Squall weather sync service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod alert;
pub mod delta;
pub mod error;
pub mod geometry;
pub mod region;
pub mod remote;
pub mod store;
pub mod zone;

pub use error::{Error, Result};
