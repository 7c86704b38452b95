//! Application services for the payments context.

pub mod command_handlers;
