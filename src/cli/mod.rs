pub mod config_cmd;
pub mod send;

pub use config_cmd::run_config;
pub use send::run_send;
