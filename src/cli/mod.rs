//! Command-line interface components
//!
//! This module contains CLI-specific code for apprepo, including argument
//! parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, CreateDestinationArgs, DeleteArgs, DestinationsAction, DestinationsArgs,
    GetArgs, GlobalArgs, InfoArgs, ListArgs, PushArgs,
};
pub use commands::{
    handle_delete, handle_destinations, handle_get, handle_info, handle_list, handle_push,
};
