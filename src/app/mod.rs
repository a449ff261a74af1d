pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod logview;
pub mod models;
pub mod shell;
pub mod state;
