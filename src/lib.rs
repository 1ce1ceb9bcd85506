pub mod cli;
pub mod commands;
pub mod config;
pub mod remote;
pub mod request;
pub mod scripts;
pub mod ssh_config;
