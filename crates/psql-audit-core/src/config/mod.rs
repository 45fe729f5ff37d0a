//! Configuration types.
//!
//! Configuration is assembled once at process start and handed to the proxy
//! by value. Nothing here is mutated after startup.

pub mod logging;
pub mod proxy;

pub use logging::{AuditOutput, LogFormat, LoggingConfig};
pub use proxy::ProxyConfig;
