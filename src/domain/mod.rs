// Domain layer - Pure types and rules of an acceptance run
pub mod channel;
pub mod error;
pub mod matrix;
pub mod node;
pub mod telemetry;
pub mod test_run;
