pub mod browser;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod library;
pub mod model;
pub mod paths;
pub mod queue;
pub mod screenshot;
pub mod state;
pub mod storage;
pub mod streaming;
