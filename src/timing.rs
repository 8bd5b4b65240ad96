//! CAN bit-timing constants.

/// Bitrate the CAN bus is operating at.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum CanSpeed {
    Kbps5,
    Kbps10,
    Kbps20,
    Kbps31_25,
    Kbps33_3,
    Kbps40,
    Kbps50,
    Kbps80,
    Kbps100,
    Kbps125,
    Kbps200,
    Kbps250,
    Kbps500,
    Kbps1000,
}

/// Frequency of the crystal attached to the controller.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum OscSpeed {
    MHz8,
    MHz16,
}

/// CNF1..CNF3 contents producing one bus bitrate from one oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub cnf1: u8,
    pub cnf2: u8,
    pub cnf3: u8,
}

impl BitTiming {
    /// Constants for an oscillator/bitrate pair, or `None` when the
    /// baud-rate prescaler cannot produce the combination.
    ///
    /// Values sourced from
    /// <https://github.com/coryjfowler/MCP_CAN_lib/blob/master/mcp_can_dfs.h>.
    pub const fn lookup(osc: OscSpeed, speed: CanSpeed) -> Option<Self> {
        let (cnf1, cnf2, cnf3): (u8, u8, u8) = match (osc, speed) {
            (OscSpeed::MHz8, CanSpeed::Kbps5) => (0xA7, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps10) => (0x93, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps20) => (0x89, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps31_25) => (0x87, 0xE5, 0x83),
            (OscSpeed::MHz8, CanSpeed::Kbps33_3) => (0x85, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps40) => (0x84, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps50) => (0x84, 0xE5, 0x83),
            (OscSpeed::MHz8, CanSpeed::Kbps80) => (0x84, 0xD3, 0x81),
            (OscSpeed::MHz8, CanSpeed::Kbps100) => (0x81, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps125) => (0x81, 0xE5, 0x83),
            (OscSpeed::MHz8, CanSpeed::Kbps200) => (0x80, 0xF6, 0x84),
            (OscSpeed::MHz8, CanSpeed::Kbps250) => (0x80, 0xE5, 0x83),
            (OscSpeed::MHz8, CanSpeed::Kbps500) => (0x00, 0xD1, 0x81),
            (OscSpeed::MHz8, CanSpeed::Kbps1000) => (0x00, 0xC0, 0x80),
            (OscSpeed::MHz16, CanSpeed::Kbps5) => (0x3F, 0xFF, 0x87),
            (OscSpeed::MHz16, CanSpeed::Kbps10) => (0x67, 0xF6, 0x84),
            (OscSpeed::MHz16, CanSpeed::Kbps20) => (0x53, 0xF6, 0x74),
            (OscSpeed::MHz16, CanSpeed::Kbps33_3) => (0x4E, 0xE5, 0x83),
            (OscSpeed::MHz16, CanSpeed::Kbps40) => (0x49, 0xF6, 0x84),
            (OscSpeed::MHz16, CanSpeed::Kbps50) => (0x47, 0xF6, 0x84),
            (OscSpeed::MHz16, CanSpeed::Kbps80) => (0x44, 0xF6, 0x84),
            (OscSpeed::MHz16, CanSpeed::Kbps100) => (0x44, 0xE5, 0x83),
            (OscSpeed::MHz16, CanSpeed::Kbps125) => (0x43, 0xE5, 0x83),
            (OscSpeed::MHz16, CanSpeed::Kbps200) => (0x41, 0xF6, 0x84),
            (OscSpeed::MHz16, CanSpeed::Kbps250) => (0x41, 0xE5, 0x83),
            (OscSpeed::MHz16, CanSpeed::Kbps500) => (0x40, 0xE5, 0x83),
            (OscSpeed::MHz16, CanSpeed::Kbps1000) => (0x00, 0xCA, 0x81),
            _ => return None,
        };
        Some(BitTiming { cnf1, cnf2, cnf3 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pairs_resolve() {
        assert_eq!(
            BitTiming::lookup(OscSpeed::MHz8, CanSpeed::Kbps500),
            Some(BitTiming {
                cnf1: 0x00,
                cnf2: 0xD1,
                cnf3: 0x81
            })
        );
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        // 31.25 kbps needs a prescaler a 16 MHz crystal cannot provide
        assert!(BitTiming::lookup(OscSpeed::MHz16, CanSpeed::Kbps31_25).is_none());
    }
}
