pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;
pub mod utils;
