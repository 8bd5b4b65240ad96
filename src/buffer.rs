//! Message buffer register blocks.
//!
//! The three Tx and two Rx buffers share one register block shape at
//! different base addresses. Lookup is table-driven: a logical buffer
//! number resolves to a compile-time constant block, or to `None` before
//! anything is put on the bus.

use crate::regs::{CanIntf, Register};

/// One buffer's registers. Identical shape for Tx and Rx.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferRegs {
    pub ctrl: Register,
    pub sidh: Register,
    pub sidl: Register,
    pub eid8: Register,
    pub eid0: Register,
    pub dlc: Register,
    pub data: [Register; 8],
}

pub(crate) const TX: [BufferRegs; 3] = [
    BufferRegs {
        ctrl: Register::TXB0CTRL,
        sidh: Register::TXB0SIDH,
        sidl: Register::TXB0SIDL,
        eid8: Register::TXB0EID8,
        eid0: Register::TXB0EID0,
        dlc: Register::TXB0DLC,
        data: [
            Register::TXB0D0,
            Register::TXB0D1,
            Register::TXB0D2,
            Register::TXB0D3,
            Register::TXB0D4,
            Register::TXB0D5,
            Register::TXB0D6,
            Register::TXB0D7,
        ],
    },
    BufferRegs {
        ctrl: Register::TXB1CTRL,
        sidh: Register::TXB1SIDH,
        sidl: Register::TXB1SIDL,
        eid8: Register::TXB1EID8,
        eid0: Register::TXB1EID0,
        dlc: Register::TXB1DLC,
        data: [
            Register::TXB1D0,
            Register::TXB1D1,
            Register::TXB1D2,
            Register::TXB1D3,
            Register::TXB1D4,
            Register::TXB1D5,
            Register::TXB1D6,
            Register::TXB1D7,
        ],
    },
    BufferRegs {
        ctrl: Register::TXB2CTRL,
        sidh: Register::TXB2SIDH,
        sidl: Register::TXB2SIDL,
        eid8: Register::TXB2EID8,
        eid0: Register::TXB2EID0,
        dlc: Register::TXB2DLC,
        data: [
            Register::TXB2D0,
            Register::TXB2D1,
            Register::TXB2D2,
            Register::TXB2D3,
            Register::TXB2D4,
            Register::TXB2D5,
            Register::TXB2D6,
            Register::TXB2D7,
        ],
    },
];

pub(crate) const RX: [BufferRegs; 2] = [
    BufferRegs {
        ctrl: Register::RXB0CTRL,
        sidh: Register::RXB0SIDH,
        sidl: Register::RXB0SIDL,
        eid8: Register::RXB0EID8,
        eid0: Register::RXB0EID0,
        dlc: Register::RXB0DLC,
        data: [
            Register::RXB0D0,
            Register::RXB0D1,
            Register::RXB0D2,
            Register::RXB0D3,
            Register::RXB0D4,
            Register::RXB0D5,
            Register::RXB0D6,
            Register::RXB0D7,
        ],
    },
    BufferRegs {
        ctrl: Register::RXB1CTRL,
        sidh: Register::RXB1SIDH,
        sidl: Register::RXB1SIDL,
        eid8: Register::RXB1EID8,
        eid0: Register::RXB1EID0,
        dlc: Register::RXB1DLC,
        data: [
            Register::RXB1D0,
            Register::RXB1D1,
            Register::RXB1D2,
            Register::RXB1D3,
            Register::RXB1D4,
            Register::RXB1D5,
            Register::RXB1D6,
            Register::RXB1D7,
        ],
    },
];

/// Resolves a Tx buffer number. Valid indices are 0..=2.
pub(crate) fn tx_buffer(index: u8) -> Option<&'static BufferRegs> {
    TX.get(usize::from(index))
}

/// Resolves an Rx buffer number together with the CANINTF bit that
/// acknowledges it. Valid indices are 0..=1.
pub(crate) fn rx_buffer(index: u8) -> Option<(&'static BufferRegs, u8)> {
    const PENDING: [u8; 2] = [CanIntf::MASK_RX0IF, CanIntf::MASK_RX1IF];
    let regs = RX.get(usize::from(index))?;
    Some((regs, PENDING[usize::from(index)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_indices_resolve_to_none() {
        assert!(tx_buffer(3).is_none());
        assert!(rx_buffer(2).is_none());
    }

    #[test]
    fn blocks_sit_at_their_base_addresses() {
        assert_eq!(tx_buffer(2).unwrap().sidh, Register::TXB2SIDH);
        assert_eq!(tx_buffer(0).unwrap().data[7], Register::TXB0D7);
        let (rx1, pending) = rx_buffer(1).unwrap();
        assert_eq!(rx1.ctrl, Register::RXB1CTRL);
        assert_eq!(rx1.data[7], Register::RXB1D7);
        assert_eq!(pending, CanIntf::MASK_RX1IF);
    }
}
