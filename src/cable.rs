use crate::registers::{Control, Data, Status};
use std::fmt;

/// The parallel port JTAG cables this library can drive.
#[non_exhaustive]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CableKind {
    /// Altera ByteBlaster (and ByteBlaster MV / clones).
    ByteBlaster,

    /// Xilinx Parallel Cable III (DLC5).
    ParallelCableIII,
}

impl CableKind {
    /// Returns the signal assignment used by this cable.
    pub fn profile(self) -> CableProfile {
        match self {
            CableKind::ByteBlaster => CableProfile::BYTEBLASTER,
            CableKind::ParallelCableIII => CableProfile::PARALLEL_CABLE_III,
        }
    }
}

impl fmt::Display for CableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CableKind::ByteBlaster => "ByteBlaster",
            CableKind::ParallelCableIII => "Xilinx Parallel Cable III",
        })
    }
}

/// ByteBlaster wiring, beyond the JTAG signals.
pub(crate) mod byteblaster {
    use super::*;

    /// Output buffer enable, active low through the inverting AUTOFD line.
    pub const ENABLE_N: Control = Control::AUTOFD;
    /// D7 is looped back to PAPEROUT.
    pub const LB_OUT: Data = Data::D7;
    pub const LB_IN: Status = Status::PAPEROUT;
    /// D5 is looped back to nACK.
    pub const ACK_OUT: Data = Data::D5;
    pub const ACK_IN: Status = Status::ACK;
}

/// Parallel Cable III wiring, beyond the JTAG signals.
pub(crate) mod pc3 {
    use super::*;

    /// Low enables the TDI/TMS/TCK buffers.
    pub const PROG_EN_N: Data = Data::D4;
    /// D6 is fed back to both BUSY and PAPEROUT.
    pub const CHECK_OUT: Data = Data::D6;
    pub const CHECK_IN1: Status = Status::BUSY;
    pub const CHECK_IN2: Status = Status::PAPEROUT;
}

/// Assignment of the JTAG signals to parallel port bits for one cable type.
///
/// TDI, TMS and TCK always occupy distinct data bits, so an output byte can be built by OR-ing
/// them onto the idle byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CableProfile {
    idle: Data,
    tdi: Data,
    tms: Data,
    tck: Data,
    tdo: Status,
    tdo_inverted: bool,
}

impl CableProfile {
    /// Altera ByteBlaster. TDO comes in on BUSY and thus reads inverted.
    pub const BYTEBLASTER: Self = Self {
        idle: Data::empty(),
        tck: Data::D0,
        tms: Data::D1,
        tdi: Data::D6,
        tdo: Status::BUSY,
        tdo_inverted: true,
    };

    /// Xilinx Parallel Cable III. TDO comes in on SELECT.
    pub const PARALLEL_CABLE_III: Self = Self {
        idle: pc3::PROG_EN_N,
        tdi: Data::D0,
        tck: Data::D1,
        tms: Data::D2,
        tdo: Status::SELECT,
        tdo_inverted: false,
    };

    /// The data byte with TCK low and TDI/TMS deasserted.
    pub fn idle(&self) -> Data {
        self.idle
    }

    pub fn tdi(&self) -> Data {
        self.tdi
    }

    pub fn tms(&self) -> Data {
        self.tms
    }

    pub fn tck(&self) -> Data {
        self.tck
    }

    /// The status bit carrying TDO.
    pub fn tdo(&self) -> Status {
        self.tdo
    }

    /// Whether the TDO status bit reads as the inverse of the TDO level.
    pub fn tdo_inverted(&self) -> bool {
        self.tdo_inverted
    }

    /// Builds the data byte for the given TMS/TDI levels, with TCK low.
    pub fn output(&self, tms: bool, tdi: bool) -> Data {
        let mut data = self.idle;
        if tdi {
            data |= self.tdi;
        }
        if tms {
            data |= self.tms;
        }
        data
    }

    /// Extracts the logical TDO level from a raw status register value.
    pub fn sample_tdo(&self, status: u8) -> bool {
        Status::from_raw(status).contains(self.tdo) != self.tdo_inverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_do_not_overlap() {
        for profile in &[CableProfile::BYTEBLASTER, CableProfile::PARALLEL_CABLE_III] {
            assert!(!profile.tdi.intersects(profile.tms | profile.tck | profile.idle));
            assert!(!profile.tms.intersects(profile.tck | profile.idle));
            assert!(!profile.tck.intersects(profile.idle));
        }
    }

    #[test]
    fn output_byte() {
        let bb = CableProfile::BYTEBLASTER;
        assert_eq!(bb.output(false, false).bits(), 0x00);
        assert_eq!(bb.output(true, true).bits(), 0x42);

        let pc3 = CableProfile::PARALLEL_CABLE_III;
        assert_eq!(pc3.output(false, false).bits(), 0x10);
        assert_eq!(pc3.output(true, false).bits(), 0x14);
        assert_eq!(pc3.output(false, true).bits(), 0x11);
    }

    #[test]
    fn tdo_polarity() {
        let bb = CableProfile::BYTEBLASTER;
        assert!(!bb.sample_tdo(0x80));
        assert!(bb.sample_tdo(0x00));

        let pc3 = CableProfile::PARALLEL_CABLE_III;
        assert!(pc3.sample_tdo(0x10));
        assert!(!pc3.sample_tdo(0xef));
    }
}
