use core::fmt::Debug;

use crate::regs::{OpMode, Register};
use crate::timing::{CanSpeed, OscSpeed};

pub type Result<T, SPIE, CSE> = core::result::Result<T, Error<SPIE, CSE>>;

/// Driver error.
///
/// `Verify` and `ModeChange` are the failure reports of the driver's
/// confirmation steps; `InvalidBuffer` is rejected before any bus
/// traffic; `Spi` and `Hal` carry transport faults from the HAL.
#[derive(Debug)]
pub enum Error<SPIE, CSE> {
    /// SPI transfer failed.
    Spi(SPIE),
    /// Chip-select pin could not be driven.
    Hal(CSE),
    /// A register readback did not return the value just written. The
    /// usual causes are a disconnected or unpowered controller, bus
    /// noise, or a write to a read-only target.
    Verify {
        reg: Register,
        expected: u8,
        found: u8,
    },
    /// CANSTAT did not confirm the requested operation mode.
    ModeChange(OpMode),
    /// Buffer index outside the controller's range. Nothing was sent.
    InvalidBuffer(u8),
    /// No bit-timing constants exist for this oscillator/bitrate pair.
    InvalidConfiguration(CanSpeed, OscSpeed),
    /// All three Tx buffers hold a pending transmission.
    TxBusy,
    /// Neither Rx buffer holds an unread message.
    NoMessage,
}

impl<SPIE: Debug, CSE: Debug> embedded_hal::can::Error for Error<SPIE, CSE> {
    fn kind(&self) -> embedded_hal::can::ErrorKind {
        embedded_hal::can::ErrorKind::Other
    }
}
