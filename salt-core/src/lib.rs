//! salt-core: Shared infrastructure for the SALT rules service.
pub mod config;
pub mod error;
pub mod observability;

pub use serde;
pub use serde_json;
pub use tracing;
