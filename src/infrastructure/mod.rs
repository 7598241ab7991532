//! Storage and event-delivery adapters for the domain ports.

pub mod event_sink;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
