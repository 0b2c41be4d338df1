pub mod config;
pub mod feed;
pub mod lifecycle;
pub mod loader;
pub mod sqlite_sink;
