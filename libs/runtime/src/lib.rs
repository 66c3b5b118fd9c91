//! Process-level plumbing shared by the server binary: layered configuration
//! and tracing setup.

pub mod config;
pub mod home_dir;
pub mod logging;

pub use config::{
    AppConfig, CdsConfig, CliArgs, EnvironmentConfig, LoggingConfig, ODataConfig, Section,
    ServerConfig,
};
pub use logging::init_logging_from_config;
