use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::can::{ExtendedId, Frame, Id, StandardId};
use embedded_hal::digital::v2::OutputPin;
use embedded_hal_mock::eh0::spi::{Mock as SpiMock, Transaction as SpiTransaction};

use crate::error::Error;
use crate::frame::CanFrame;
use crate::id::IdRegs;
use crate::regs::{OpMode, Register};
use crate::timing::{CanSpeed, OscSpeed};
use crate::{Mcp2515, TxBuffers};

const WRITE: u8 = 0x02;
const READ: u8 = 0x03;
const BITMOD: u8 = 0x05;
const RTS: u8 = 0x80;
const READ_STATUS: u8 = 0xA0;
const RESET: u8 = 0xC0;

/// Chip-select stub. Select/deselect is not part of the recorded
/// protocol; the transaction expectations pin it down well enough.
struct CsStub;

impl OutputPin for CsStub {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct NoDelay;

impl DelayMs<u8> for NoDelay {
    fn delay_ms(&mut self, _ms: u8) {}
}

/// One READ transaction answering `value`.
fn read_back(reg: Register, value: u8) -> SpiTransaction {
    SpiTransaction::transfer(vec![READ, reg as u8, 0x00], vec![0x00, 0x00, value])
}

/// WRITE transaction plus the readback confirming it.
fn verified_write(reg: Register, value: u8) -> Vec<SpiTransaction> {
    vec![
        SpiTransaction::transfer(vec![WRITE, reg as u8, value], vec![0x00, 0x00, 0x00]),
        read_back(reg, value),
    ]
}

/// BIT MODIFY transaction plus a readback answering `readback`.
fn verified_modify(reg: Register, mask: u8, value: u8, readback: u8) -> Vec<SpiTransaction> {
    vec![
        SpiTransaction::transfer(vec![BITMOD, reg as u8, mask, value], vec![0x00; 4]),
        read_back(reg, readback),
    ]
}

fn quick_status(value: u8) -> SpiTransaction {
    SpiTransaction::transfer(vec![READ_STATUS, 0x00], vec![0x00, value])
}

#[test]
fn write_register_confirms_readback() {
    let mut spi = SpiMock::new(&verified_write(Register::CANINTE, 0x03));
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.write_register(Register::CANINTE, 0x03).is_ok());
    spi.done();
}

#[test]
fn write_register_reports_mismatch() {
    let tx = vec![
        SpiTransaction::transfer(vec![WRITE, Register::CANINTE as u8, 0x03], vec![0x00; 3]),
        read_back(Register::CANINTE, 0x00),
    ];
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    match drv.write_register(Register::CANINTE, 0x03) {
        Err(Error::Verify {
            reg,
            expected,
            found,
        }) => {
            assert_eq!(reg, Register::CANINTE);
            assert_eq!(expected, 0x03);
            assert_eq!(found, 0x00);
        }
        other => panic!("expected verify failure, got {:?}", other),
    }
    spi.done();
}

#[test]
fn modify_bits_checks_masked_bits_only() {
    // readback has plenty of foreign bits set; only the masked ones count
    let tx = verified_modify(Register::CANINTF, 0x01, 0x00, 0xFE);
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.modify_bits(Register::CANINTF, 0x01, 0x00).is_ok());
    spi.done();
}

#[test]
fn modify_bits_rejects_masked_mismatch() {
    let tx = verified_modify(Register::CANINTF, 0x01, 0x00, 0x01);
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(
        drv.modify_bits(Register::CANINTF, 0x01, 0x00),
        Err(Error::Verify { .. })
    ));
    spi.done();
}

#[test]
fn switch_mode_confirms_against_canstat() {
    let mut tx = verified_modify(Register::CANCTRL, 0xE0, 0x40, 0x40);
    tx.push(read_back(Register::CANSTAT, 0x40));
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.switch_mode(OpMode::Loopback).is_ok());
    spi.done();
}

#[test]
fn switch_mode_fails_when_canstat_disagrees() {
    let mut tx = verified_modify(Register::CANCTRL, 0xE0, 0x40, 0x40);
    tx.push(read_back(Register::CANSTAT, 0x00));
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(
        drv.switch_mode(OpMode::Loopback),
        Err(Error::ModeChange(OpMode::Loopback))
    ));
    spi.done();
}

#[test]
fn load_frame_rejects_bad_index_without_bus_traffic() {
    let mut spi = SpiMock::new(&[]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);
    let frame = CanFrame::new(Id::Standard(StandardId::new(0x123).unwrap()), &[1]).unwrap();

    assert!(matches!(
        drv.load_frame(3, &frame),
        Err(Error::InvalidBuffer(3))
    ));
    spi.done();
}

#[test]
fn read_frame_rejects_bad_index_without_bus_traffic() {
    let mut spi = SpiMock::new(&[]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(drv.read_frame(2), Err(Error::InvalidBuffer(2))));
    spi.done();
}

#[test]
fn load_frame_pads_short_payload_with_zeros() {
    let frame = CanFrame::new(
        Id::Standard(StandardId::new(0x123).unwrap()),
        &[1, 2, 3, 4, 5],
    )
    .unwrap();

    let mut tx = Vec::new();
    tx.extend(verified_write(Register::TXB0SIDH, 0x24));
    tx.extend(verified_write(Register::TXB0SIDL, 0x60));
    tx.extend(verified_write(Register::TXB0EID8, 0x00));
    tx.extend(verified_write(Register::TXB0EID0, 0x00));
    tx.extend(verified_write(Register::TXB0DLC, 0x05));
    let data_regs = [
        Register::TXB0D0,
        Register::TXB0D1,
        Register::TXB0D2,
        Register::TXB0D3,
        Register::TXB0D4,
        Register::TXB0D5,
        Register::TXB0D6,
        Register::TXB0D7,
    ];
    let payload = [1, 2, 3, 4, 5, 0, 0, 0];
    for (&reg, &byte) in data_regs.iter().zip(payload.iter()) {
        tx.extend(verified_write(reg, byte));
    }

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.load_frame(0, &frame).is_ok());
    spi.done();
}

#[test]
fn load_frame_marks_extended_remote_frames() {
    let frame = CanFrame::new_remote(Id::Extended(ExtendedId::new(0x1000_0000).unwrap()), 2)
        .unwrap();

    let mut tx = Vec::new();
    tx.extend(verified_write(Register::TXB2SIDH, 0x80));
    tx.extend(verified_write(Register::TXB2SIDL, 0x08));
    tx.extend(verified_write(Register::TXB2EID8, 0x00));
    tx.extend(verified_write(Register::TXB2EID0, 0x00));
    // remote marker on top of the length nibble
    tx.extend(verified_write(Register::TXB2DLC, 0x42));
    let data_regs = [
        Register::TXB2D0,
        Register::TXB2D1,
        Register::TXB2D2,
        Register::TXB2D3,
        Register::TXB2D4,
        Register::TXB2D5,
        Register::TXB2D6,
        Register::TXB2D7,
    ];
    for &reg in data_regs.iter() {
        tx.extend(verified_write(reg, 0x00));
    }

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.load_frame(2, &frame).is_ok());
    spi.done();
}

#[test]
fn request_transmit_combines_rts_flags_into_one_instruction() {
    let tx = vec![SpiTransaction::transfer(
        vec![RTS | 0b101],
        vec![0x00],
    )];
    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv
        .request_transmit(TxBuffers::TXB0 | TxBuffers::TXB2)
        .is_ok());
    spi.done();
}

#[test]
fn read_frame_assembles_message_and_acknowledges_it() {
    let mut tx = vec![
        read_back(Register::RXB0CTRL, 0x00),
        read_back(Register::RXB0SIDH, 0x24),
        read_back(Register::RXB0SIDL, 0x60),
        read_back(Register::RXB0EID8, 0x00),
        read_back(Register::RXB0EID0, 0x00),
        read_back(Register::RXB0DLC, 0x03),
        read_back(Register::RXB0D0, 0xAA),
        read_back(Register::RXB0D1, 0xBB),
        read_back(Register::RXB0D2, 0xCC),
    ];
    // acknowledgment touches this buffer's pending bit and nothing else
    tx.extend(verified_modify(Register::CANINTF, 0x01, 0x00, 0x00));

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    let frame = drv.read_frame(0).unwrap();
    assert_eq!(frame.id(), Id::Standard(StandardId::new(0x123).unwrap()));
    assert!(!frame.is_remote_frame());
    assert_eq!(frame.dlc(), 3);
    assert_eq!(frame.data(), &[0xAA, 0xBB, 0xCC]);
    // bytes beyond the received length come back zeroed
    assert_eq!(frame.data, [0xAA, 0xBB, 0xCC, 0, 0, 0, 0, 0]);
    spi.done();
}

#[test]
fn read_frame_clamps_oversized_dlc_and_flags_remote() {
    let id = IdRegs::encode(0x0ABC_DEF1, true);
    let mut tx = vec![
        read_back(Register::RXB1CTRL, 0x08),
        read_back(Register::RXB1SIDH, id.sidh),
        read_back(Register::RXB1SIDL, id.sidl),
        read_back(Register::RXB1EID8, id.eid8),
        read_back(Register::RXB1EID0, id.eid0),
        // a noise-corrupted length nibble above 8
        read_back(Register::RXB1DLC, 0x0A),
    ];
    let data_regs = [
        Register::RXB1D0,
        Register::RXB1D1,
        Register::RXB1D2,
        Register::RXB1D3,
        Register::RXB1D4,
        Register::RXB1D5,
        Register::RXB1D6,
        Register::RXB1D7,
    ];
    for (i, &reg) in data_regs.iter().enumerate() {
        tx.push(read_back(reg, i as u8 + 1));
    }
    tx.extend(verified_modify(Register::CANINTF, 0x02, 0x00, 0x00));

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    let frame = drv.read_frame(1).unwrap();
    assert_eq!(
        frame.id(),
        Id::Extended(ExtendedId::new(0x0ABC_DEF1).unwrap())
    );
    assert!(frame.is_remote_frame());
    assert_eq!(frame.dlc(), 8);
    assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    spi.done();
}

#[test]
fn send_message_picks_the_first_free_buffer() {
    let frame = CanFrame::new(Id::Standard(StandardId::new(0x001).unwrap()), &[0xAA]).unwrap();

    // TXB0 busy, TXB1 free
    let mut tx = vec![quick_status(0b0000_0100)];
    tx.extend(verified_write(Register::TXB1SIDH, 0x00));
    tx.extend(verified_write(Register::TXB1SIDL, 0x20));
    tx.extend(verified_write(Register::TXB1EID8, 0x00));
    tx.extend(verified_write(Register::TXB1EID0, 0x00));
    tx.extend(verified_write(Register::TXB1DLC, 0x01));
    let data_regs = [
        Register::TXB1D0,
        Register::TXB1D1,
        Register::TXB1D2,
        Register::TXB1D3,
        Register::TXB1D4,
        Register::TXB1D5,
        Register::TXB1D6,
        Register::TXB1D7,
    ];
    let payload = [0xAA, 0, 0, 0, 0, 0, 0, 0];
    for (&reg, &byte) in data_regs.iter().zip(payload.iter()) {
        tx.extend(verified_write(reg, byte));
    }
    tx.push(SpiTransaction::transfer(vec![RTS | 0b010], vec![0x00]));

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.send_message(&frame).is_ok());
    spi.done();
}

#[test]
fn send_message_reports_all_buffers_busy() {
    let frame = CanFrame::new(Id::Standard(StandardId::new(0x001).unwrap()), &[]).unwrap();

    // all three TXREQ bits set
    let mut spi = SpiMock::new(&[quick_status(0b0101_0100)]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(drv.send_message(&frame), Err(Error::TxBusy)));
    spi.done();
}

#[test]
fn read_message_without_pending_buffers() {
    let mut spi = SpiMock::new(&[quick_status(0x00), quick_status(0x00)]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(drv.read_message(), Err(Error::NoMessage)));
    assert!(matches!(
        drv.try_read_message(),
        Err(nb::Error::WouldBlock)
    ));
    spi.done();
}

#[test]
fn reset_is_a_single_instruction() {
    let mut spi = SpiMock::new(&[SpiTransaction::transfer(vec![RESET], vec![0x00])]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv.reset(&mut NoDelay).is_ok());
    spi.done();
}

#[test]
fn set_bitrate_programs_the_cnf_registers() {
    let mut tx = Vec::new();
    tx.extend(verified_write(Register::CNF1, 0x41));
    tx.extend(verified_write(Register::CNF2, 0xE5));
    tx.extend(verified_write(Register::CNF3, 0x83));

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv
        .set_bitrate(CanSpeed::Kbps250, OscSpeed::MHz16, false)
        .is_ok());
    spi.done();
}

#[test]
fn clkout_clears_the_sof_bit_of_cnf3() {
    let mut tx = Vec::new();
    tx.extend(verified_write(Register::CNF1, 0x41));
    tx.extend(verified_write(Register::CNF2, 0xE5));
    tx.extend(verified_write(Register::CNF3, 0x03));

    let mut spi = SpiMock::new(&tx);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(drv
        .set_bitrate(CanSpeed::Kbps250, OscSpeed::MHz16, true)
        .is_ok());
    spi.done();
}

#[test]
fn unsupported_bitrate_pair_never_reaches_the_bus() {
    let mut spi = SpiMock::new(&[]);
    let mut drv = Mcp2515::new(spi.clone(), CsStub);

    assert!(matches!(
        drv.set_bitrate(CanSpeed::Kbps31_25, OscSpeed::MHz16, false),
        Err(Error::InvalidConfiguration(
            CanSpeed::Kbps31_25,
            OscSpeed::MHz16
        ))
    ));
    spi.done();
}
