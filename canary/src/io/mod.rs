//! I/O helpers: configuration, the remote test service, message files and reports.

pub mod client;
pub mod config;
pub mod message;
pub mod report;
