//! Command handlers for the Openverse CLI.

pub(crate) mod generate;
pub(crate) mod maintenance;

pub(crate) use generate::handle_generate_command;
pub(crate) use maintenance::handle_maintenance_command;
