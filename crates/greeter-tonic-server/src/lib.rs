#![doc = include_str!("../README.md")]

pub mod server;

pub use server::config::{CliArgs, LogFormat, ServerConfig};
pub use server::service::handler::GreeterService;
