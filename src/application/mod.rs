// Application layer - The acquisition engine and the ports it depends on
pub mod cancel;
pub mod classifier;
pub mod error;
pub mod events;
pub mod plan;
pub mod report_sink;
pub mod sequencer;
pub mod session;
pub mod stimulus;
pub mod telemetry_port;
