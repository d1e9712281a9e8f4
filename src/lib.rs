pub mod commands;
pub mod config;
pub mod error;
pub mod keno;
pub mod view;
