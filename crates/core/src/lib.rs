//! Core types for freshtag.
//!
//! This crate provides:
//! - Validation tags, tag strategies, and `If-None-Match` matching
//! - An expiring tag store with SQLite, in-memory, and disabled backends
//! - The validation engine and post-write invalidation
//! - A SQLite-backed user store
//! - Request and cache metrics
//! - Configuration and unified error types

pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod tag;

pub use cache::{TagStore, TagStoreStats};
pub use config::AppConfig;
pub use db::{Database, Schema};
pub use engine::{Decision, Disposition, ValidationEngine, ValidationOutcome};
pub use entity::{Entity, EntityStore, User, UserPatch, UserStore};
pub use error::Error;
pub use metrics::{MetricsRecorder, PerformanceSummary};
pub use tag::{IfNoneMatch, TagGenerator, TagStrategy, ValidationTag};
