// Infrastructure layer - Configuration and adapters for the engine's ports
pub mod config;
pub mod report_writer;
pub mod simulated_pack;
