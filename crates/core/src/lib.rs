//! Harvest Core - incremental synchronization and execution engine.
//!
//! This crate plans what each entity still needs, drives the bounded
//! fetch/persist loop per entity, deduplicates and bulk-writes results and
//! reports progress. It is database-agnostic and defines the store traits
//! implemented by the `storage-sqlite` crate; providers plug in through the
//! [`sync::Recorder`] trait.

pub mod calendar;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod records;
pub mod registry;
pub mod sync;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
