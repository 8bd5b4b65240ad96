//! Register-level driver for MCP2515 CAN controller chips on SPI.
//!
//! Every register write is confirmed with a readback; that is the only
//! way to notice an absent or non-responding controller on a bus that
//! cannot signal errors by itself.

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod frame;
pub mod id;
pub mod regs;
pub mod stat;
pub mod timing;

mod buffer;
#[cfg(test)]
mod tests;

use core::fmt::Debug;

use bitflags::bitflags;
use embedded_hal::{
    blocking::{can::Can, delay::DelayMs, spi::Transfer},
    digital::v2::OutputPin,
    spi::{Mode, Phase, Polarity, MODE_0},
};

use crate::buffer::BufferRegs;
use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::id::IdRegs;
use crate::regs::{
    CanCtrl, CanInte, CanStat, Cnf3, DlcReg, OpMode, RecvBufOpMode, Register, RxbCtrl,
};
use crate::stat::Status;
use crate::timing::{BitTiming, CanSpeed, OscSpeed};

/// SPI instruction opcodes.
#[repr(u8)]
enum Instruction {
    Write = 0x02,
    Read = 0x03,
    Bitmod = 0x05,
    // LoadTx0 = 0x40,
    // LoadTx1 = 0x42,
    // LoadTx2 = 0x44,
    // ReadRx0 = 0x90,
    // ReadRx1 = 0x94,
    /// Request-to-send. The low three bits select TXB0/1/2 and may be
    /// combined, see [`TxBuffers`].
    Rts = 0x80,
    ReadStatus = 0xA0,
    // RxStatus = 0xB0,
    Reset = 0xC0,
}

bitflags! {
    /// Tx buffers named by a request-to-send instruction. Flags OR
    /// together to start several buffers with a single instruction.
    pub struct TxBuffers: u8 {
        const TXB0 = 0b0000_0001;
        const TXB1 = 0b0000_0010;
        const TXB2 = 0b0000_0100;
    }
}

impl TxBuffers {
    /// Flag of a single buffer index. Bits beyond the three buffers are
    /// dropped.
    fn for_index(index: u8) -> Self {
        TxBuffers::from_bits_truncate(1 << index)
    }
}

/// Bit order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Bus parameters the host SPI peripheral must be programmed with for
/// the controller to understand its transactions.
///
/// The driver cannot reach the host's SPI registers, so this is a
/// contract rather than something the driver enforces: construct the
/// bus to match [`SpiConfig::default`] (or whatever you pass to
/// [`Mcp2515::with_config`]) before handing it over.
#[derive(Clone, Copy)]
pub struct SpiConfig {
    /// Upper bound for the clock rate in hertz.
    pub max_clock_hz: u32,
    /// Clock polarity and phase.
    pub mode: Mode,
    /// Bit order on the wire.
    pub bit_order: BitOrder,
}

impl core::fmt::Debug for SpiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // `embedded_hal::spi::Mode` does not implement `Debug`, so format
        // its public fields by hand to keep `SpiConfig: Debug`.
        let polarity = match self.mode.polarity {
            Polarity::IdleLow => "IdleLow",
            Polarity::IdleHigh => "IdleHigh",
        };
        let phase = match self.mode.phase {
            Phase::CaptureOnFirstTransition => "CaptureOnFirstTransition",
            Phase::CaptureOnSecondTransition => "CaptureOnSecondTransition",
        };
        f.debug_struct("SpiConfig")
            .field("max_clock_hz", &self.max_clock_hz)
            .field("mode", &format_args!("Mode {{ polarity: {}, phase: {} }}", polarity, phase))
            .field("bit_order", &self.bit_order)
            .finish()
    }
}

impl Default for SpiConfig {
    /// 10 MHz ceiling, mode 0 (idle-low, leading-edge sample), MSB
    /// first.
    fn default() -> Self {
        Self {
            max_clock_hz: 10_000_000,
            mode: MODE_0,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

/// Settings used to initialise the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct Settings {
    /// Operation mode to end up in.
    pub mode: OpMode,
    /// Bus bitrate.
    pub can_speed: CanSpeed,
    /// Frequency of the crystal on the board.
    pub osc_speed: OscSpeed,
    /// Whether to enable the CLKOUT pin.
    pub clkout_en: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::Normal,
            can_speed: CanSpeed::Kbps100,
            osc_speed: OscSpeed::MHz16,
            clkout_en: false,
        }
    }
}

/// MCP2515 driver.
///
/// Owns the SPI handle and chip-select pin for its whole lifetime; the
/// controller behind them must not be shared. All operations are
/// synchronous and issue their bus transactions to completion before
/// returning. Nothing is retried: a failed verification is reported
/// once and left to the caller.
pub struct Mcp2515<SPI, CS> {
    spi: SPI,
    cs: CS,
    config: SpiConfig,
}

impl<SPI, CS, SPIE, CSE> Mcp2515<SPI, CS>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    SPIE: Debug,
    CSE: Debug,
{
    /// Creates a driver with the default bus contract
    /// ([`SpiConfig::default`]).
    ///
    /// The driver only takes ownership of the interface; creating and
    /// configuring the SPI peripheral is up to the caller, who must
    /// program it to match [`SpiConfig`].
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self::with_config(spi, cs, SpiConfig::default())
    }

    /// Creates a driver documenting a non-default bus contract, e.g. a
    /// lower clock ceiling for long wires.
    pub fn with_config(spi: SPI, cs: CS, config: SpiConfig) -> Self {
        Self { spi, cs, config }
    }

    /// The bus parameters this instance was constructed with.
    pub fn spi_config(&self) -> SpiConfig {
        self.config
    }

    /// Initialises the controller. Call once at startup.
    ///
    /// Resets the chip, confirms Configuration mode, programs the bit
    /// timing, zeroes the Tx buffers, opens both Rx buffers to every
    /// valid message (acceptance filtering stays off), enables the
    /// receive and error interrupt sources, and finally switches into
    /// `settings.mode`.
    ///
    /// # Parameters
    ///
    /// * `delay` - Delay implementation from the downstream HAL.
    /// * `settings` - See [`Settings`].
    pub fn init(
        &mut self,
        delay: &mut impl DelayMs<u8>,
        settings: Settings,
    ) -> Result<(), SPIE, CSE> {
        self.cs.set_high().map_err(Error::Hal)?;
        self.reset(delay)?;

        // Reset is not acknowledged by the chip; the confirmed mode
        // switch doubles as the liveness check.
        self.switch_mode(OpMode::Configuration)?;

        self.set_bitrate(settings.can_speed, settings.osc_speed, settings.clkout_en)?;
        self.set_clkout(settings.clkout_en)?;

        for block in buffer::TX.iter() {
            self.clear_tx_buffer(block)?;
        }

        // Receive-any policy, RXB0 rolling over into RXB1 when full.
        let rxb0 = RxbCtrl::new()
            .with_rxm(RecvBufOpMode::FilterOff)
            .with_bukt(true);
        self.modify_bits(
            Register::RXB0CTRL,
            RxbCtrl::MASK_RXM | RxbCtrl::MASK_BUKT,
            rxb0.into_bytes()[0],
        )?;
        let rxb1 = RxbCtrl::new().with_rxm(RecvBufOpMode::FilterOff);
        self.modify_bits(Register::RXB1CTRL, RxbCtrl::MASK_RXM, rxb1.into_bytes()[0])?;

        // Interrupt sources for message reception and bus errors.
        let inte = CanInte::new()
            .with_rx0ie(true)
            .with_rx1ie(true)
            .with_errie(true)
            .with_merre(true);
        self.write_register(Register::CANINTE, inte.into_bytes()[0])?;

        self.switch_mode(settings.mode)
    }

    /// Resets the controller, leaving it in Configuration mode.
    ///
    /// The chip does not acknowledge the reset instruction; this always
    /// succeeds at the protocol level. Chain a
    /// [`switch_mode(OpMode::Configuration)`](Self::switch_mode) when a
    /// confirmation is needed.
    pub fn reset(&mut self, delay: &mut impl DelayMs<u8>) -> Result<(), SPIE, CSE> {
        self.transfer(&mut [Instruction::Reset as u8])?;
        // A sleeping chip takes a few milliseconds to come back.
        delay.delay_ms(5);
        Ok(())
    }

    /// Switches the operation mode and confirms the transition.
    ///
    /// Writes the requested mode into CANCTRL and compares it against
    /// the read-only mirror in CANSTAT. One check, no polling: the
    /// transition is effectively immediate once the write lands, so a
    /// mismatch means the controller refused or never saw the request.
    pub fn switch_mode(&mut self, mode: OpMode) -> Result<(), SPIE, CSE> {
        self.modify_bits(Register::CANCTRL, CanCtrl::MASK_REQOP, (mode as u8) << 5)?;

        let stat = CanStat::from_bytes([self.read_register(Register::CANSTAT)?]);
        if stat.opmod_or_err() == Ok(mode) {
            Ok(())
        } else {
            Err(Error::ModeChange(mode))
        }
    }

    /// Programs CNF1..CNF3 for the given bitrate.
    ///
    /// Only effective in Configuration mode; elsewhere the CNF
    /// registers are read-only and the write verification reports the
    /// refusal.
    pub fn set_bitrate(
        &mut self,
        can_speed: CanSpeed,
        osc_speed: OscSpeed,
        clkout_en: bool,
    ) -> Result<(), SPIE, CSE> {
        let timing = BitTiming::lookup(osc_speed, can_speed)
            .ok_or(Error::InvalidConfiguration(can_speed, osc_speed))?;

        let mut cnf3 = Cnf3::from_bytes([timing.cnf3]);
        if clkout_en {
            cnf3 = cnf3.with_sof(false);
        }

        self.write_register(Register::CNF1, timing.cnf1)?;
        self.write_register(Register::CNF2, timing.cnf2)?;
        self.write_register(Register::CNF3, cnf3.into_bytes()[0])
    }

    /// Loads a frame into a Tx buffer without starting transmission.
    ///
    /// Valid indices are 0..=2; anything else is rejected before a
    /// single byte goes out. The identifier registers, the DLC and all
    /// eight data registers are written and verified one by one, with
    /// payload bytes beyond the frame's length written as zero.
    pub fn load_frame(&mut self, index: u8, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        let block = buffer::tx_buffer(index).ok_or(Error::InvalidBuffer(index))?;

        let id = IdRegs::from_id(&frame.id);
        self.write_register(block.sidh, id.sidh)?;
        self.write_register(block.sidl, id.sidl)?;
        self.write_register(block.eid8, id.eid8)?;
        self.write_register(block.eid0, id.eid0)?;

        let dlc = DlcReg::new().with_dlc(frame.dlc).with_rtr(frame.rtr);
        self.write_register(block.dlc, dlc.into_bytes()[0])?;

        for (i, &reg) in block.data.iter().enumerate() {
            let byte = if i < usize::from(frame.dlc) {
                frame.data[i]
            } else {
                0x00
            };
            self.write_register(reg, byte)?;
        }
        Ok(())
    }

    /// Reads a frame out of an Rx buffer and acknowledges it.
    ///
    /// Valid indices are 0..=1. Data registers beyond the received
    /// length are not read; the returned frame carries zeros there. The
    /// buffer's message-pending flag in CANINTF is cleared afterwards —
    /// without that the controller considers the buffer occupied and
    /// will not signal the next message into it.
    ///
    /// Reads are not verified; unlike a write there is nothing to
    /// compare a readback against.
    pub fn read_frame(&mut self, index: u8) -> Result<CanFrame, SPIE, CSE> {
        let (block, pending) = buffer::rx_buffer(index).ok_or(Error::InvalidBuffer(index))?;

        let ctrl = RxbCtrl::from_bytes([self.read_register(block.ctrl)?]);

        let id = IdRegs {
            sidh: self.read_register(block.sidh)?,
            sidl: self.read_register(block.sidl)?,
            eid8: self.read_register(block.eid8)?,
            eid0: self.read_register(block.eid0)?,
        };

        let dlc_reg = DlcReg::from_bytes([self.read_register(block.dlc)?]);
        let dlc = dlc_reg.dlc().min(8);

        let mut data = [0u8; 8];
        for (i, &reg) in block.data.iter().enumerate() {
            if i < usize::from(dlc) {
                data[i] = self.read_register(reg)?;
            }
        }

        self.modify_bits(Register::CANINTF, pending, 0x00)?;

        Ok(CanFrame {
            id: id.to_id(),
            rtr: ctrl.rxrtr(),
            dlc,
            data,
        })
    }

    /// Requests transmission of the given buffers with one instruction.
    ///
    /// Fire and forget: completion shows up later in the status flags.
    /// An empty selection is a no-op on the chip.
    pub fn request_transmit(&mut self, buffers: TxBuffers) -> Result<(), SPIE, CSE> {
        self.transfer(&mut [Instruction::Rts as u8 | buffers.bits()])?;
        Ok(())
    }

    /// Sends a frame via the first free Tx buffer.
    ///
    /// Returns [`Error::TxBusy`] when all three buffers have a pending
    /// transmission.
    pub fn send_message(&mut self, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        let index = self.find_free_tx_buf()?;
        self.load_frame(index, frame)?;
        self.request_transmit(TxBuffers::for_index(index))
    }

    /// Reads a pending message, draining RXB0 before RXB1.
    pub fn read_message(&mut self) -> Result<CanFrame, SPIE, CSE> {
        match self.read_status()?.pending_rx() {
            Some(index) => self.read_frame(index),
            None => Err(Error::NoMessage),
        }
    }

    /// Non-blocking flavour of [`read_message`](Self::read_message):
    /// an empty controller is [`nb::Error::WouldBlock`] instead of
    /// [`Error::NoMessage`].
    pub fn try_read_message(&mut self) -> nb::Result<CanFrame, Error<SPIE, CSE>> {
        match self.read_message() {
            Ok(frame) => Ok(frame),
            Err(Error::NoMessage) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    /// Index of the first Tx buffer with no pending transmission.
    pub fn find_free_tx_buf(&mut self) -> Result<u8, SPIE, CSE> {
        let status = self.read_status()?;
        for index in 0..buffer::TX.len() as u8 {
            if !status.tx_req(index) {
                return Ok(index);
            }
        }
        Err(Error::TxBusy)
    }

    /// Issues a READ STATUS instruction.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut data = [Instruction::ReadStatus as u8, 0];
        self.transfer(&mut data).map(|b| Status::from_bytes([b]))
    }

    /// Reads a single register.
    pub fn read_register(&mut self, reg: Register) -> Result<u8, SPIE, CSE> {
        let mut data = [Instruction::Read as u8, reg as u8, 0];
        self.transfer(&mut data)
    }

    /// Writes a single register, then reads it back to confirm the
    /// value landed.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Write as u8, reg as u8, value];
        self.transfer(&mut data)?;

        let found = self.read_register(reg)?;
        if found == value {
            Ok(())
        } else {
            Err(Error::Verify {
                reg,
                expected: value,
                found,
            })
        }
    }

    /// Replaces the bits selected by `mask` with the corresponding bits
    /// of `value`, then reads back and compares the selected bits only.
    ///
    /// Bits outside the mask are not checked: the bit-modify
    /// instruction leaves them alone, but hardware-driven status bits
    /// in the same register may change under the driver's feet.
    pub fn modify_bits(&mut self, reg: Register, mask: u8, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Bitmod as u8, reg as u8, mask, value];
        self.transfer(&mut data)?;

        let found = self.read_register(reg)?;
        if found & mask == value & mask {
            Ok(())
        } else {
            Err(Error::Verify {
                reg,
                expected: value & mask,
                found: found & mask,
            })
        }
    }

    /// Enables or disables the CLKOUT pin.
    fn set_clkout(&mut self, clkout_en: bool) -> Result<(), SPIE, CSE> {
        let ctrl = CanCtrl::new().with_clken(clkout_en);
        self.modify_bits(Register::CANCTRL, CanCtrl::MASK_CLKEN, ctrl.into_bytes()[0])
    }

    /// Zeroes one Tx buffer block, control register through D7.
    fn clear_tx_buffer(&mut self, block: &BufferRegs) -> Result<(), SPIE, CSE> {
        let head = [
            block.ctrl, block.sidh, block.sidl, block.eid8, block.eid0, block.dlc,
        ];
        for &reg in head.iter() {
            self.write_register(reg, 0x00)?;
        }
        for &reg in block.data.iter() {
            self.write_register(reg, 0x00)?;
        }
        Ok(())
    }

    /// Transfers `bytes` with chip select held low, returning the last
    /// byte the controller clocked out (0 for an empty transfer).
    fn transfer(&mut self, bytes: &mut [u8]) -> Result<u8, SPIE, CSE> {
        self.with_cs(|spi| spi.transfer(bytes))?
            .map_err(Error::Spi)?;
        Ok(bytes.last().copied().unwrap_or(0))
    }

    /// Runs `f` between asserting and releasing the chip select pin.
    fn with_cs<T>(&mut self, f: impl FnOnce(&mut SPI) -> T) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Hal)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Hal)?;
        Ok(result)
    }
}

impl<SPI, CS, SPIE, CSE> Can for Mcp2515<SPI, CS>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    #[inline]
    fn transmit(&mut self, frame: &Self::Frame) -> Result<(), SPIE, CSE> {
        self.send_message(frame)
    }

    #[inline]
    fn receive(&mut self) -> Result<Self::Frame, SPIE, CSE> {
        self.read_message()
    }
}
