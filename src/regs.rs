//! MCP2515 register map and register contents.
//!
//! Addresses cover the full 0x00..=0x7D space. Buffer data registers are
//! named byte by byte because the driver addresses them individually;
//! that is what lets every write be confirmed with a readback.

use modular_bitfield::prelude::*;

/// Byte-addressed register of the MCP2515.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    // Acceptance filters 0..=2
    RXF0SIDH = 0x00,
    RXF0SIDL = 0x01,
    RXF0EID8 = 0x02,
    RXF0EID0 = 0x03,
    RXF1SIDH = 0x04,
    RXF1SIDL = 0x05,
    RXF1EID8 = 0x06,
    RXF1EID0 = 0x07,
    RXF2SIDH = 0x08,
    RXF2SIDL = 0x09,
    RXF2EID8 = 0x0A,
    RXF2EID0 = 0x0B,
    // Pin control
    BFPCTRL = 0x0C,
    TXRTSCTRL = 0x0D,
    // Mode status / control
    CANSTAT = 0x0E,
    CANCTRL = 0x0F,
    // Acceptance filters 3..=5
    RXF3SIDH = 0x10,
    RXF3SIDL = 0x11,
    RXF3EID8 = 0x12,
    RXF3EID0 = 0x13,
    RXF4SIDH = 0x14,
    RXF4SIDL = 0x15,
    RXF4EID8 = 0x16,
    RXF4EID0 = 0x17,
    RXF5SIDH = 0x18,
    RXF5SIDL = 0x19,
    RXF5EID8 = 0x1A,
    RXF5EID0 = 0x1B,
    // Error counters
    TEC = 0x1C,
    REC = 0x1D,
    // Acceptance masks
    RXM0SIDH = 0x20,
    RXM0SIDL = 0x21,
    RXM0EID8 = 0x22,
    RXM0EID0 = 0x23,
    RXM1SIDH = 0x24,
    RXM1SIDL = 0x25,
    RXM1EID8 = 0x26,
    RXM1EID0 = 0x27,
    // Bit timing
    CNF3 = 0x28,
    CNF2 = 0x29,
    CNF1 = 0x2A,
    // Interrupt enable / flags, error flags
    CANINTE = 0x2B,
    CANINTF = 0x2C,
    EFLG = 0x2D,
    // Tx buffer 0
    TXB0CTRL = 0x30,
    TXB0SIDH = 0x31,
    TXB0SIDL = 0x32,
    TXB0EID8 = 0x33,
    TXB0EID0 = 0x34,
    TXB0DLC = 0x35,
    TXB0D0 = 0x36,
    TXB0D1 = 0x37,
    TXB0D2 = 0x38,
    TXB0D3 = 0x39,
    TXB0D4 = 0x3A,
    TXB0D5 = 0x3B,
    TXB0D6 = 0x3C,
    TXB0D7 = 0x3D,
    // Tx buffer 1
    TXB1CTRL = 0x40,
    TXB1SIDH = 0x41,
    TXB1SIDL = 0x42,
    TXB1EID8 = 0x43,
    TXB1EID0 = 0x44,
    TXB1DLC = 0x45,
    TXB1D0 = 0x46,
    TXB1D1 = 0x47,
    TXB1D2 = 0x48,
    TXB1D3 = 0x49,
    TXB1D4 = 0x4A,
    TXB1D5 = 0x4B,
    TXB1D6 = 0x4C,
    TXB1D7 = 0x4D,
    // Tx buffer 2
    TXB2CTRL = 0x50,
    TXB2SIDH = 0x51,
    TXB2SIDL = 0x52,
    TXB2EID8 = 0x53,
    TXB2EID0 = 0x54,
    TXB2DLC = 0x55,
    TXB2D0 = 0x56,
    TXB2D1 = 0x57,
    TXB2D2 = 0x58,
    TXB2D3 = 0x59,
    TXB2D4 = 0x5A,
    TXB2D5 = 0x5B,
    TXB2D6 = 0x5C,
    TXB2D7 = 0x5D,
    // Rx buffer 0
    RXB0CTRL = 0x60,
    RXB0SIDH = 0x61,
    RXB0SIDL = 0x62,
    RXB0EID8 = 0x63,
    RXB0EID0 = 0x64,
    RXB0DLC = 0x65,
    RXB0D0 = 0x66,
    RXB0D1 = 0x67,
    RXB0D2 = 0x68,
    RXB0D3 = 0x69,
    RXB0D4 = 0x6A,
    RXB0D5 = 0x6B,
    RXB0D6 = 0x6C,
    RXB0D7 = 0x6D,
    // Rx buffer 1
    RXB1CTRL = 0x70,
    RXB1SIDH = 0x71,
    RXB1SIDL = 0x72,
    RXB1EID8 = 0x73,
    RXB1EID0 = 0x74,
    RXB1DLC = 0x75,
    RXB1D0 = 0x76,
    RXB1D1 = 0x77,
    RXB1D2 = 0x78,
    RXB1D3 = 0x79,
    RXB1D4 = 0x7A,
    RXB1D5 = 0x7B,
    RXB1D6 = 0x7C,
    RXB1D7 = 0x7D,
}

/// CANCTRL contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanCtrl {
    /// CLKOUT prescaler.
    pub clkpre: ClkPre,
    /// CLKOUT enable.
    pub clken: bool,
    /// One-shot mode.
    pub osm: bool,
    /// Abort all pending transmissions.
    pub abat: bool,
    /// Requested operation mode.
    pub reqop: OpMode,
}

impl CanCtrl {
    /// Bits of the `reqop` field.
    pub const MASK_REQOP: u8 = 0b1110_0000;
    /// Bit of the `clken` flag.
    pub const MASK_CLKEN: u8 = 0b0000_0100;
}

/// CANSTAT contents. Read-only mirror of the active mode.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanStat {
    #[skip]
    __: B1,
    /// Interrupt flag code.
    #[skip(setters)]
    pub icod: IntFlagCode,
    #[skip]
    __: B1,
    /// Operation mode the controller is actually in.
    #[skip(setters)]
    pub opmod: OpMode,
}

/// CANINTF contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanIntf {
    pub rx0if: bool,
    pub rx1if: bool,
    pub tx0if: bool,
    pub tx1if: bool,
    pub tx2if: bool,
    pub errif: bool,
    pub wakif: bool,
    pub merrf: bool,
}

impl CanIntf {
    /// Message-pending flag of Rx buffer 0.
    pub const MASK_RX0IF: u8 = 0b0000_0001;
    /// Message-pending flag of Rx buffer 1.
    pub const MASK_RX1IF: u8 = 0b0000_0010;
}

/// CANINTE contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanInte {
    pub rx0ie: bool,
    pub rx1ie: bool,
    pub tx0ie: bool,
    pub tx1ie: bool,
    pub tx2ie: bool,
    pub errie: bool,
    pub wakie: bool,
    pub merre: bool,
}

/// CNF1 contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf1 {
    /// Baud rate prescaler.
    pub brp: B6,
    /// Synchronisation jump width.
    pub sjw: SyncJumpWidth,
}

/// CNF2 contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf2 {
    pub prseg: B3,
    pub phseg1: B3,
    pub sam: bool,
    pub btlmode: bool,
}

/// CNF3 contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf3 {
    pub phseg2: B3,
    #[skip]
    __: B3,
    pub wakfil: bool,
    /// Start-of-frame signal on the CLKOUT pin. Must stay clear while
    /// CLKOUT carries the clock.
    pub sof: bool,
}

/// RXBnCTRL contents. The fields this driver uses sit at the same
/// positions in both Rx buffers; the buffer-specific filter-hit bits
/// are skipped.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxbCtrl {
    #[skip]
    __: B2,
    /// Rollover into RXB1 when RXB0 is full. RXB0 only.
    pub bukt: bool,
    /// Received frame was a remote transmission request.
    // Bit position taken from the RXBnCTRL layout in the datasheet;
    // not yet confirmed against hardware.
    #[skip(setters)]
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive buffer operating mode.
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}

impl RxbCtrl {
    /// Bits of the `rxm` field.
    pub const MASK_RXM: u8 = 0b0110_0000;
    /// Bit of the `bukt` flag.
    pub const MASK_BUKT: u8 = 0b0000_0100;
}

/// TXBnDLC / RXBnDLC contents.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DlcReg {
    /// Number of significant payload bytes, 0..=8.
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote transmission request (Tx side).
    pub rtr: bool,
    #[skip]
    __: B1,
}

///////////////////
/// Enums
///////////////////

/// Operation mode, 3-bit field in the top of CANCTRL, mirrored
/// read-only in the top of CANSTAT.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum OpMode {
    Normal,
    Sleep,
    Loopback,
    ListenOnly,
    Configuration,
}

/// Receive buffer operating mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum RecvBufOpMode {
    /// Messages must pass an acceptance filter to be stored.
    FilterOn = 0x0,
    /// Masks and filters are bypassed; every valid message is stored.
    FilterOff = 0x3,
}

/// Synchronisation jump width, CNF1.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum SyncJumpWidth {
    Tq1,
    Tq2,
    Tq3,
    Tq4,
}

/// CLKOUT pin prescaler, CANCTRL.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum ClkPre {
    Div1,
    Div2,
    Div4,
    Div8,
}

/// Interrupt flag code, CANSTAT.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum IntFlagCode {
    None,
    Error,
    WakeUp,
    TXB0,
    TXB1,
    TXB2,
    RXB0,
    RXB1,
}
