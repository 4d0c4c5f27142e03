pub mod app;
pub mod classify;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod entry;
pub mod imaging;
pub mod indicator;
pub mod logging;
pub mod monitor;
pub mod storage;
pub mod store;
pub mod tray;

pub use app::run;
