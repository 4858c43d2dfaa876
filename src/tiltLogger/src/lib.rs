
pub mod logging;
pub mod error;
pub mod config;
pub mod mrc;
pub mod formats;
pub mod corrections;
pub mod watcher;
pub mod export;
pub mod dilate;
pub mod commands;
