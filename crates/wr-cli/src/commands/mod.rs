//! CLI command implementations

mod config;
mod send;
mod serve;
mod status;

pub use config::{config_get, config_init, config_set, config_show};
pub use send::{file_command, image_command, send_command};
pub use serve::{load_relay_config, serve_command, ServeOverrides};
pub use status::status_command;
