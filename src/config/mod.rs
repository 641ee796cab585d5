//! Configuration management
//!
//! Node settings with explicit defaults, layered from an optional TOML
//! file, the environment and the command line, then turned into
//! `ServerOptions`.

pub mod settings;

pub use settings::{NodeConfig, DEFAULT_BLOCK_TIME_MS};
