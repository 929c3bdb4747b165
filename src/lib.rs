//! Repository analysis job service
//!
//! Accepts repository references over HTTP, runs the external analysis tool
//! for each one on its own background task, tracks job progress in memory and
//! serves the generated documentation as a `.tar.gz` archive.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
