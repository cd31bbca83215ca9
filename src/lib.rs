pub mod audio;
pub mod config;
pub mod error;
pub mod stats;
