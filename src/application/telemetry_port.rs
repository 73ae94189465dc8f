// Telemetry port trait - Register link to the pack controller
use crate::application::error::PortError;
use async_trait::async_trait;

/// Request/response access to the controller's holding registers.
///
/// Implementations serialize requests at the transport level; the sequencer
/// and the stimulus driver share one port concurrently.
#[async_trait]
pub trait TelemetryPort: Send + Sync {
    async fn connect(&self) -> Result<(), PortError>;

    async fn disconnect(&self) -> Result<(), PortError>;

    /// Read `count` consecutive holding registers starting at `start_offset`
    async fn read(&self, slave: u8, start_offset: u16, count: u16) -> Result<Vec<u16>, PortError>;

    /// Write a single holding register
    async fn write(&self, slave: u8, offset: u16, value: u16) -> Result<(), PortError>;
}
