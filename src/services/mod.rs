pub mod archiver;
pub mod orchestrator;
pub mod runner;
pub mod store;
