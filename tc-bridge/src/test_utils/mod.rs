//! Fakes and fixtures for tests of the bridge.

pub mod database;
pub mod durable;
pub mod sender;
