//! CLI command implementations.

pub mod browse;
pub mod proxy;
pub mod store;
