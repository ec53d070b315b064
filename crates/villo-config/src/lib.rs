//! Configuration system for the villo bike-share tracker.
//!
//! Provides TOML-based configuration with:
//! - Site selection by preset (`brussels`, `lyon`) or explicit URL
//! - HTTP timeout and user agent
//! - Session refresh policy and window
//! - Discovery options
//!
//! Config file layering: user config dir, then project-local `villo.toml`.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
