//! Command handlers for the signup CLI

pub mod config;
pub mod creation;

pub use config::handle_config_command;
pub use creation::handle_creation_command;
