//! Observability for the storage layer.

mod metrics;

pub use metrics::{record_container_read, record_container_write};
