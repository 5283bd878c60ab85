//! Cache and durable storage of TC records.

pub mod base;
pub mod memory;
pub mod postgres;

pub use base::{COIL_SPEED_WINDOW, CacheStore, CoilRecords, DurableStore, StoredRecord};
