pub mod api;
pub mod config;
pub mod error;
pub mod image_processing;
pub mod jobs;
pub mod mcp_server;
pub mod poller;
pub mod providers;
pub mod records;
pub mod service;
pub mod status;
pub mod storage;
pub mod tools;

#[cfg(test)]
mod testing;
