pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod driver;
pub mod fleet;
pub mod global;
