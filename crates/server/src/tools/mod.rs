//! MCP tool implementations.
//!
//! This module contains all tools exposed by the freshtag server.

pub mod cache;
pub mod metrics;
pub mod users;
