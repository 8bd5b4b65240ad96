//! Arbitration identifier packing.
//!
//! A CAN identifier is spread over four register bytes: `SIDH` and `SIDL`
//! carry the 11-bit standard identifier, `SIDL` additionally carries the
//! extended-frame marker and the top two extended bits, `EID8`/`EID0`
//! carry the remaining extended bits. Every place that touches an
//! identifier on the wire goes through [`IdRegs`]; the layout is defined
//! nowhere else.

use embedded_hal::can::{ExtendedId, Id, StandardId};

/// The four identifier bytes of a message buffer, filter or mask, in
/// register order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct IdRegs {
    pub sidh: u8,
    pub sidl: u8,
    pub eid8: u8,
    pub eid0: u8,
}

impl IdRegs {
    /// EXIDE marker, bit 3 of `SIDL`.
    pub const EXIDE: u8 = 0x08;

    /// Packs a raw identifier into register bytes.
    ///
    /// Extended layout:
    ///
    /// ```text
    /// id     28 ......... 21 | 20 19 18 | 17 16 | 15 ....... 8 | 7 ...... 0
    ///        ~~~~~ SIDH ~~~~ | SIDL 7:5 |  1:0  | ~~~ EID8 ~~~ | ~~ EID0 ~~
    /// ```
    ///
    /// Standard layout uses `SIDH` and `SIDL[7:5]` only. The caller is
    /// responsible for the identifier fitting 11 or 29 bits; excess high
    /// bits are shifted out.
    pub fn encode(id: u32, extended: bool) -> Self {
        if extended {
            IdRegs {
                sidh: (id >> 21) as u8,
                sidl: ((id >> 13) & 0xE0) as u8 | Self::EXIDE | ((id >> 16) & 0x03) as u8,
                eid8: (id >> 8) as u8,
                eid0: id as u8,
            }
        } else {
            IdRegs {
                sidh: (id >> 3) as u8,
                sidl: ((id as u8) & 0x07) << 5,
                eid8: 0,
                eid0: 0,
            }
        }
    }

    /// Unpacks register bytes into a raw identifier and the extended
    /// flag. Pure inverse of [`encode`](Self::encode); bit 3 of `SIDL`
    /// alone selects the branch.
    pub fn decode(self) -> (u32, bool) {
        let extended = self.sidl & Self::EXIDE != 0;
        let id = if extended {
            (u32::from(self.sidh) << 21)
                | (u32::from(self.sidl & 0xE0) << 13)
                | (u32::from(self.sidl & 0x03) << 16)
                | (u32::from(self.eid8) << 8)
                | u32::from(self.eid0)
        } else {
            (u32::from(self.sidh) << 3) | (u32::from(self.sidl & 0xE0) >> 5)
        };
        (id, extended)
    }

    /// Packs an [`Id`].
    pub fn from_id(id: &Id) -> Self {
        match id {
            Id::Standard(sid) => Self::encode(u32::from(sid.as_raw()), false),
            Id::Extended(eid) => Self::encode(eid.as_raw(), true),
        }
    }

    /// Unpacks into an [`Id`].
    pub fn to_id(self) -> Id {
        let (raw, extended) = self.decode();
        if extended {
            // decode() produces at most 29 significant bits
            Id::Extended(unsafe { ExtendedId::new_unchecked(raw) })
        } else {
            // and at most 11 in the standard branch
            Id::Standard(unsafe { StandardId::new_unchecked(raw as u16) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_extended() {
        for id in [0x1FFF_FFFFu32, 0x0000_0000, 0x1000_0000].iter().copied() {
            assert_eq!(IdRegs::encode(id, true).decode(), (id, true));
        }
    }

    #[test]
    fn round_trip_standard() {
        for id in [0x7FFu32, 0].iter().copied() {
            assert_eq!(IdRegs::encode(id, false).decode(), (id, false));
        }
    }

    #[test]
    fn extended_layout_matches_register_convention() {
        let regs = IdRegs::encode(0x1FFF_FFFF, true);
        assert_eq!(
            regs,
            IdRegs {
                sidh: 0xFF,
                sidl: 0xEB,
                eid8: 0xFF,
                eid0: 0xFF
            }
        );
        // an all-zero extended id still carries the EXIDE marker
        assert_eq!(IdRegs::encode(0, true).sidl, IdRegs::EXIDE);
    }

    #[test]
    fn standard_layout_leaves_extended_bytes_clear() {
        let regs = IdRegs::encode(0x7FF, false);
        assert_eq!(
            regs,
            IdRegs {
                sidh: 0xFF,
                sidl: 0xE0,
                eid8: 0,
                eid0: 0
            }
        );
    }

    #[test]
    fn exide_bit_alone_selects_the_branch() {
        // every other SIDL bit set, EXIDE clear: standard
        let (_, extended) = IdRegs {
            sidh: 0xFF,
            sidl: 0xF7,
            eid8: 0xFF,
            eid0: 0xFF,
        }
        .decode();
        assert!(!extended);

        // only EXIDE set: extended
        let (id, extended) = IdRegs {
            sidh: 0x00,
            sidl: 0x08,
            eid8: 0x00,
            eid0: 0x00,
        }
        .decode();
        assert!(extended);
        assert_eq!(id, 0);
    }
}
