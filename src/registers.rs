//! Bit definitions of the three PC parallel port registers.
//!
//! Names and values follow the Linux `<linux/parport.h>` convention, which FreeBSD's ppbus uses
//! as well (with different names).

use bitflags::bitflags;

bitflags! {
    /// Data register (base + 0), driving pins 2..9.
    pub struct Data: u8 {
        /// Pin 2.
        const D0 = 1 << 0;
        /// Pin 3.
        const D1 = 1 << 1;
        /// Pin 4.
        const D2 = 1 << 2;
        /// Pin 5.
        const D3 = 1 << 3;
        /// Pin 6.
        const D4 = 1 << 4;
        /// Pin 7.
        const D5 = 1 << 5;
        /// Pin 8.
        const D6 = 1 << 6;
        /// Pin 9.
        const D7 = 1 << 7;
    }
}

bitflags! {
    /// Status register (base + 1), an input-only register.
    ///
    /// Bits 0..2 are reserved and not represented here.
    pub struct Status: u8 {
        /// Pin 15, nERROR.
        const ERROR = 0x08;
        /// Pin 13, SELECT (printer online).
        const SELECT = 0x10;
        /// Pin 12, PAPEROUT.
        const PAPEROUT = 0x20;
        /// Pin 10, nACK.
        const ACK = 0x40;
        /// Pin 11, BUSY. The register bit is the inverse of the pin level.
        const BUSY = 0x80;
    }
}

bitflags! {
    /// Control register (base + 2).
    pub struct Control: u8 {
        /// Pin 1, nSTROBE.
        const STROBE = 0x01;
        /// Pin 14, nAUTOFD. Writing a one drives the pin low.
        const AUTOFD = 0x02;
        /// Pin 16, nINIT.
        const INIT = 0x04;
        /// Pin 17, nSELECT_IN.
        const SELECT = 0x08;
    }
}

impl Data {
    /// Returns `self` with `bits` flipped.
    pub(crate) fn toggled(self, bits: Data) -> Data {
        self ^ bits
    }
}

impl Status {
    pub(crate) fn from_raw(raw: u8) -> Self {
        let this = Self::from_bits_truncate(raw);
        if this.bits() != raw {
            log::trace!(
                "reserved status bits: 0x{:02X} truncated to 0x{:02X} ({:?})",
                raw,
                this.bits(),
                this,
            );
        }
        this
    }
}
