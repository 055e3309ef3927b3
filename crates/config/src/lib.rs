//! Configuration loading for pulse.
//!
//! Config is read from `pulse.toml`; see [`discover_and_load`] for the lookup
//! order and [`template::default_config_template`] for every option.

mod error;
pub mod loader;
pub mod schema;
pub mod template;

pub use {
    error::{ConfigError, Result},
    loader::{CONFIG_ENV, CONFIG_FILENAME, config_dir, discover_and_load, find_config, load_config},
    schema::{MetricsConfig, PulseConfig, QueryConfig, ServerConfig},
};
