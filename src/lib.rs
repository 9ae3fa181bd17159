pub mod cli;
pub mod common;
pub mod deps;
pub mod downloader;
