//! JTAG over parallel port cables.
//!
//! This crate bit-bangs the four JTAG signals through the data and status registers of a PC
//! parallel port, using one of two passive (or nearly passive) adapter cables:
//!
//! * the Altera **ByteBlaster** (and its many clones), and
//! * the Xilinx **Parallel Cable III**, also known as DLC5.
//!
//! The two cables use incompatible pin assignments, so the attached cable is identified from its
//! loopback wiring before any JTAG traffic is sent. Driving the wrong cable is refused rather than
//! guessed; see [`detect_cable`].
//!
//! This is a signal transport only. It does not track the TAP state machine; higher layers build
//! on [`ParportJtag::transfer_bit`], [`ParportJtag::shift_block`] and [`ParportJtag::shift_tms`].
//!
//! # Pinout
//!
//! DB-25 pin numbers. "inv." marks inputs whose status register bit reads inverted.
//!
//! ```notrust
//!  Signal      ByteBlaster               Parallel Cable III
//! ────────────────────────────────────────────────────────────────
//!  TCK         D0  (pin 2)               D1  (pin 3)
//!  TMS         D1  (pin 3)               D2  (pin 4)
//!  TDI         D6  (pin 8)               D0  (pin 2)
//!  TDO         BUSY (pin 11, inv.)       SELECT (pin 13)
//!  enable      nAUTOFD (pin 14)          D4  (pin 6), active low
//!  loopback    D7 (pin 9) → PAPEROUT     D6 (pin 8) → BUSY, PAPEROUT
//!              D5 (pin 7) → nACK           (pins 11, 12)
//!  presence    nERROR (pin 15) grounded  nERROR (pin 15) high
//! ```
//!
//! # Platform support
//!
//! The port is accessed through the `ppdev` driver on Linux, the `ppi` driver on FreeBSD and the
//! `$VDMLPT1` device on Windows. Other register access mechanisms can be plugged in by
//! implementing [`Transport`] and passing it to [`ParportJtag::with_transport`].
//!
//! [`detect_cable`]: fn.detect_cable.html
//! [`Transport`]: transport/trait.Transport.html
//! [`ParportJtag::transfer_bit`]: struct.ParportJtag.html#method.transfer_bit
//! [`ParportJtag::shift_block`]: struct.ParportJtag.html#method.shift_block
//! [`ParportJtag::shift_tms`]: struct.ParportJtag.html#method.shift_tms
//! [`ParportJtag::with_transport`]: struct.ParportJtag.html#method.with_transport

#![doc(html_root_url = "https://docs.rs/parport-jtag/0.1.0")]
// Deny a few warnings in doctests, since rustdoc `allow`s many warnings by default
#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![warn(missing_debug_implementations, rust_2018_idioms)]

mod bits;
mod cable;
mod detect;
mod error;
mod readme;
pub mod registers;
pub mod transport;

pub use self::bits::BitIter;
pub use self::cable::{CableKind, CableProfile};
pub use self::detect::{detect_cable, Rejection};
pub use self::error::{Error, ErrorKind};
pub use self::transport::Transport;

use self::cable::byteblaster;
use self::registers::Data;
use log::{debug, trace, warn};
use std::{fmt, mem};

/// A result type with the error hardwired to [`Error`].
///
/// [`Error`]: struct.Error.html
pub type Result<T> = std::result::Result<T, Error>;

/// A JTAG session on a parallel port with a detected cable.
///
/// The session owns the port for its whole lifetime. Dropping it disables the ByteBlaster output
/// buffers (if that is the attached cable) and then releases the port.
///
/// All operations go straight to the hardware registers; there is no buffering and no retrying.
/// A failed register access should be treated as fatal to the whole session, since some of the
/// bits of the current operation may already have been clocked into the target.
pub struct ParportJtag<P: Transport> {
    port: P,
    cable: CableKind,
    profile: CableProfile,
    /// Number of TCK cycles generated so far.
    clocked: u64,
    /// Backing storage for the `BitIter` returned by `jtag_io`.
    tdo_buf: Vec<u8>,
}

#[cfg(any(target_os = "linux", target_os = "freebsd", windows))]
impl ParportJtag<transport::SystemPort> {
    /// Opens a parallel port and detects the attached cable.
    ///
    /// If `path` is `None`, the `XCPORT` environment variable is used, falling back to
    /// [`DEFAULT_DEVICE`].
    ///
    /// `freq` is the requested TCK frequency in Hz. The parallel port has no clock divider, so
    /// the cable is always clocked as fast as register accesses allow and `freq` is ignored.
    ///
    /// The port is released again if any step fails.
    ///
    /// [`DEFAULT_DEVICE`]: transport/constant.DEFAULT_DEVICE.html
    pub fn open(path: Option<&std::path::Path>, freq: u32) -> Result<Self> {
        let path = transport::device_path(path);
        debug!(
            "opening {} (requested {} Hz, not configurable)",
            path.display(),
            freq
        );
        let port = transport::SystemPort::open(&path)?;
        Self::with_transport(port)
    }
}

impl<P: Transport> ParportJtag<P> {
    /// Detects the cable attached to `port` and starts a session on it.
    ///
    /// `port` is dropped if no supported cable is found.
    pub fn with_transport(mut port: P) -> Result<Self> {
        let cable = detect_cable(&mut port)?;
        Ok(Self {
            port,
            cable,
            profile: cable.profile(),
            clocked: 0,
            tdo_buf: Vec::new(),
        })
    }

    /// Returns the type of the attached cable.
    pub fn cable(&self) -> CableKind {
        self.cable
    }

    /// Returns the signal assignment in use.
    pub fn profile(&self) -> &CableProfile {
        &self.profile
    }

    /// Returns the number of TCK cycles generated during this session.
    pub fn clocked_bits(&self) -> u64 {
        self.clocked
    }

    fn write(&mut self, data: Data) -> Result<()> {
        self.port.write_data(data.bits())
    }

    /// Puts TMS/TDI on the wires with TCK low, then raises TCK.
    ///
    /// TCK is left high. The low phase of the next bit produces the falling edge.
    fn clock(&mut self, tms: bool, tdi: bool) -> Result<()> {
        let data = self.profile.output(tms, tdi);
        self.write(data)?;
        self.write(data | self.profile.tck())?;
        self.clocked += 1;
        Ok(())
    }

    /// Returns the bus to the idle byte: TCK low, TDI and TMS deasserted.
    fn idle(&mut self) -> Result<()> {
        self.write(self.profile.idle())
    }

    /// Clocks one bit and samples TDO after the rising TCK edge.
    ///
    /// Returns the logical TDO level (the cable's inversion is already undone). TCK stays high
    /// on return.
    pub fn transfer_bit(&mut self, tms: bool, tdi: bool) -> Result<bool> {
        self.clock(tms, tdi)?;
        let status = self.port.read_status()?;
        let tdo = self.profile.sample_tdo(status);
        trace!("transfer_bit: tms {} tdi {} tdo {}", tms, tdi, tdo);
        Ok(tdo)
    }

    /// Clocks one bit without reading TDO.
    ///
    /// Produces the same edges as [`transfer_bit`], but saves the status register read.
    ///
    /// [`transfer_bit`]: #method.transfer_bit
    pub fn transfer_bit_no_sample(&mut self, tms: bool, tdi: bool) -> Result<()> {
        trace!("transfer_bit_no_sample: tms {} tdi {}", tms, tdi);
        self.clock(tms, tdi)
    }

    /// Shifts the 8 bits of `byte` into TDI, LSB first, with TMS low.
    pub fn shift_byte(&mut self, byte: u8) -> Result<()> {
        for bit in 0..8 {
            self.transfer_bit_no_sample(false, (byte >> bit) & 1 != 0)?;
        }
        Ok(())
    }

    /// Shifts `bits` bits through TDI and TDO, LSB first.
    ///
    /// TMS is low for all but the last bit, which uses `last_tms`; setting it leaves the
    /// Shift-IR/Shift-DR state on the final bit. The bus is returned to idle afterwards, also
    /// when `bits` is 0.
    ///
    /// # Parameters
    ///
    /// * `tdi`: Bits to send, or `None` to send zeros.
    /// * `tdo`: Buffer receiving the sampled TDO bits, or `None` to skip sampling. If `bits` is not
    ///   a multiple of 8, the unused high bits of the last byte are unspecified.
    ///
    /// # Panics
    ///
    /// This method will panic if `tdi` or `tdo` hold fewer than `bits` bits.
    pub fn shift_block(
        &mut self,
        tdi: Option<&[u8]>,
        mut tdo: Option<&mut [u8]>,
        bits: usize,
        last_tms: bool,
    ) -> Result<()> {
        let mut tdi = tdi.map(|buf| BitIter::new(buf, bits));
        if let Some(tdo) = &tdo {
            assert!(tdo.len() * 8 >= bits, "TDO buffer too small");
        }

        for i in 0..bits {
            let tms = last_tms && i == bits - 1;
            let tdi = tdi.as_mut().and_then(Iterator::next).unwrap_or(false);
            match &mut tdo {
                Some(tdo) => {
                    let bit = self.transfer_bit(tms, tdi)?;
                    let byte = &mut tdo[i / 8];
                    if i % 8 == 0 {
                        *byte = 0;
                    }
                    *byte |= (bit as u8) << (i % 8);
                }
                None => self.transfer_bit_no_sample(tms, tdi)?,
            }
        }

        self.idle()
    }

    /// Shifts `bits` TMS bits from `tms`, LSB first, with TDI held high.
    ///
    /// The bus is returned to idle afterwards.
    ///
    /// # Panics
    ///
    /// This method will panic if `tms` holds fewer than `bits` bits.
    pub fn shift_tms(&mut self, tms: &[u8], bits: usize) -> Result<()> {
        for tms in BitIter::new(tms, bits) {
            self.transfer_bit_no_sample(tms, true)?;
        }
        self.idle()
    }

    /// Performs a JTAG I/O operation.
    ///
    /// This will shift out data on TMS and TDI, while reading data shifted into TDO. The bus is
    /// returned to idle afterwards.
    ///
    /// The data received on TDO is returned to the caller as an iterator yielding `bool`s.
    ///
    /// # Panics
    ///
    /// This method will panic if `tms` and `tdi` have different lengths.
    // NB: Explicit `'a` lifetime used to improve rustdoc output
    pub fn jtag_io<'a, M, D>(&'a mut self, tms: M, tdi: D) -> Result<BitIter<'a>>
    where
        M: IntoIterator<Item = bool>,
        D: IntoIterator<Item = bool>,
    {
        let mut tms = tms.into_iter();
        let mut tdi = tdi.into_iter();
        let mut buf = mem::take(&mut self.tdo_buf);
        buf.clear();

        let mut len = 0;
        loop {
            let (tms, tdi) = match (tms.next(), tdi.next()) {
                (Some(tms), Some(tdi)) => (tms, tdi),
                (None, None) => break,
                _ => panic!("TMS and TDI must have the same number of bits"),
            };

            let tdo = self.transfer_bit(tms, tdi)?;
            if len % 8 == 0 {
                buf.push(0);
            }
            buf[len / 8] |= (tdo as u8) << (len % 8);
            len += 1;
        }

        self.tdo_buf = buf;
        self.idle()?;
        Ok(BitIter::new(&self.tdo_buf, len))
    }

    fn disable_byteblaster(&mut self) -> Result<()> {
        let control = self.port.read_control()?;
        self.port
            .write_control(control & !byteblaster::ENABLE_N.bits())
    }
}

impl<P: Transport> Drop for ParportJtag<P> {
    fn drop(&mut self) {
        if self.cable == CableKind::ByteBlaster {
            if let Err(e) = self.disable_byteblaster() {
                warn!("failed to disable ByteBlaster outputs: {}", e);
            }
        }

        debug!("total bytes sent: {}", self.clocked >> 3);
        // `port` is released after this
    }
}

impl<P: Transport> fmt::Debug for ParportJtag<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParportJtag")
            .field("cable", &self.cable)
            .field("clocked", &self.clocked)
            .finish()
    }
}
