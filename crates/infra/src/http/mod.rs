//! HTTP execution adapter

pub mod executor;

pub use executor::{build_header_map, HttpRequestExecutor};
