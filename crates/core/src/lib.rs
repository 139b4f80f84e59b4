//! Core types and shared functionality for the fintrack offline cache.
//!
//! This crate provides:
//! - Cache storage with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStore, MemoryStore, Snapshot};
pub use config::AppConfig;
pub use error::Error;
