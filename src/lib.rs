//! homedash library
//!
//! The stale-while-revalidate cache, the data sources behind each card, and
//! the dashboard UI. The binary in `main.rs` wires them to a terminal.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod refresh;
pub mod ui;
