//! Tag store maintenance tools.

pub mod purge;
pub mod stats;

pub use purge::{TagStorePurgeParams, purge_impl};
pub use stats::stats_impl;
