// Subcommand implementations; each returns the process exit code

pub mod cache;
pub mod config;
pub mod install;
pub mod list;
pub mod system;
pub mod versions;
