//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → CLI overrides (--target, --log, --listen)
//!     → validation.rs (semantic checks)
//!     → InterceptorConfig (immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CaptureConfig, InterceptorConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
