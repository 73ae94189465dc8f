// Simulated pack controller - In-memory register bank for bench runs without hardware
use crate::application::error::PortError;
use crate::application::telemetry_port::TelemetryPort;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct PackState {
    connected: bool,
    registers: BTreeMap<u16, u16>,
}

/// Answers only to its own slave address, like a single device on a bus.
/// Registers never written read as zero.
#[derive(Debug)]
pub struct SimulatedPack {
    slave: u8,
    response_delay: Duration,
    state: RwLock<PackState>,
}

impl SimulatedPack {
    pub fn new(slave: u8) -> Self {
        Self {
            slave,
            response_delay: Duration::ZERO,
            state: RwLock::new(PackState::default()),
        }
    }

    /// Delay applied to every request, standing in for serial turnaround.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Preload consecutive registers starting at `start`.
    pub fn with_registers(mut self, start: u16, values: &[u16]) -> Self {
        {
            let state = self.state.get_mut();
            for (offset, value) in (start..=u16::MAX).zip(values) {
                state.registers.insert(offset, *value);
            }
        }
        self
    }

    async fn respond(&self, slave: u8) -> Result<(), PortError> {
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
        if slave != self.slave {
            return Err(PortError::Timeout);
        }
        if !self.state.read().await.connected {
            return Err(PortError::NotConnected);
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryPort for SimulatedPack {
    async fn connect(&self) -> Result<(), PortError> {
        self.state.write().await.connected = true;
        tracing::debug!("simulated pack {} connected", self.slave);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        self.state.write().await.connected = false;
        Ok(())
    }

    async fn read(&self, slave: u8, start_offset: u16, count: u16) -> Result<Vec<u16>, PortError> {
        self.respond(slave).await?;

        let end = u32::from(start_offset) + u32::from(count);
        if end > 0x1_0000 {
            return Err(PortError::Transport(format!(
                "illegal data address: {} registers from {}",
                count, start_offset
            )));
        }

        let state = self.state.read().await;
        Ok((u32::from(start_offset)..end)
            .map(|offset| {
                u16::try_from(offset)
                    .ok()
                    .and_then(|o| state.registers.get(&o).copied())
                    .unwrap_or(0)
            })
            .collect())
    }

    async fn write(&self, slave: u8, offset: u16, value: u16) -> Result<(), PortError> {
        self.respond(slave).await?;
        self.state.write().await.registers.insert(offset, value);
        Ok(())
    }
}
