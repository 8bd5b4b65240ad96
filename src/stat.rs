use modular_bitfield::prelude::*;

/// Flags returned by the READ STATUS instruction: the Rx pending and Tx
/// interrupt flags plus the three TXREQ bits, packed into one byte so
/// buffer polling costs a single transaction.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct Status {
    #[skip(setters)]
    pub rx0if: bool,
    #[skip(setters)]
    pub rx1if: bool,
    #[skip(setters)]
    pub tx0req: bool,
    #[skip(setters)]
    pub tx0if: bool,
    #[skip(setters)]
    pub tx1req: bool,
    #[skip(setters)]
    pub tx1if: bool,
    #[skip(setters)]
    pub tx2req: bool,
    #[skip(setters)]
    pub tx2if: bool,
}

impl Status {
    /// TXREQ flag of the given Tx buffer. Unknown indices read as busy.
    pub fn tx_req(&self, index: u8) -> bool {
        match index {
            0 => self.tx0req(),
            1 => self.tx1req(),
            2 => self.tx2req(),
            _ => true,
        }
    }

    /// Lowest-numbered Rx buffer holding an unread message.
    pub fn pending_rx(&self) -> Option<u8> {
        if self.rx0if() {
            Some(0)
        } else if self.rx1if() {
            Some(1)
        } else {
            None
        }
    }
}
