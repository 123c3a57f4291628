//! CLI module for the signup CLI tool
//!
//! This module organizes all CLI-related functionality including
//! command structures and their handlers.

pub mod commands;

pub use commands::{handle_config_command, handle_creation_command};
