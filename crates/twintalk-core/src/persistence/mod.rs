//! Durable storage: `sled`-backed implementations of the registry and state
//! log capability traits, sharing the same embedded-DB discipline (one
//! `Tree` per concern, `flush_async` after each mutating write).

pub mod sled_registry;
pub mod sled_state_log;

pub use sled_registry::SledTwinRegistry;
pub use sled_state_log::SledStateLog;
