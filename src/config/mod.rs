//! Configuration management
//!
//! Node settings from defaults, an optional TOML file, the environment and
//! the command line, in that order of precedence.

pub mod settings;

pub use settings::{Config, DEFAULT_BOOTSTRAP_PEER, DEFAULT_HOST, DEFAULT_PORT};
