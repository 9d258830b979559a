//! Register-level access to the parallel port.

use crate::registers::Status;
use crate::Result;
use std::env;
use std::path::{Path, PathBuf};

#[cfg(any(target_os = "linux", target_os = "freebsd", windows))]
pub use self::sys::SystemPort;
#[cfg(target_os = "linux")]
pub use self::sys::Ppdev;
#[cfg(target_os = "freebsd")]
pub use self::sys::Ppi;
#[cfg(windows)]
pub use self::sys::Vdm;

/// Environment variable overriding the default device path.
pub const DEVICE_ENV: &str = "XCPORT";

/// Device node used when neither a path nor [`DEVICE_ENV`] is given.
///
/// [`DEVICE_ENV`]: constant.DEVICE_ENV.html
#[cfg(not(windows))]
pub const DEFAULT_DEVICE: &str = "/dev/parport0";
/// Device node used when neither a path nor [`DEVICE_ENV`] is given.
///
/// [`DEVICE_ENV`]: constant.DEVICE_ENV.html
#[cfg(windows)]
pub const DEFAULT_DEVICE: &str = r"\\.\$VDMLPT1";

/// Status bits that the Windows `$VDMLPT` interface reports at pin level.
const VDM_STATUS_INVERTED: Status = Status::BUSY;

/// Converts a status byte read through `$VDMLPT` into the PC register value.
#[cfg_attr(not(windows), allow(dead_code))]
fn vdm_status(raw: u8) -> u8 {
    raw ^ VDM_STATUS_INVERTED.bits()
}

/// Access to the data, status and control registers of a parallel port.
///
/// Every method performs exactly one register access. Implementations must not buffer or retry;
/// a failed access is reported as an [`ErrorKind::RegisterIo`] error.
///
/// Values are the register contents as seen by a PC-style port: in particular, the BUSY status
/// bit reads as the inverse of its pin. Platform-specific quirks of the underlying driver are
/// corrected inside the implementation.
///
/// [`ErrorKind::RegisterIo`]: ../enum.ErrorKind.html#variant.RegisterIo
pub trait Transport {
    fn write_data(&mut self, data: u8) -> Result<()>;
    fn write_control(&mut self, control: u8) -> Result<()>;
    fn read_control(&mut self) -> Result<u8>;
    fn read_status(&mut self) -> Result<u8>;
}

impl<T: Transport + ?Sized> Transport for &'_ mut T {
    fn write_data(&mut self, data: u8) -> Result<()> {
        (**self).write_data(data)
    }

    fn write_control(&mut self, control: u8) -> Result<()> {
        (**self).write_control(control)
    }

    fn read_control(&mut self) -> Result<u8> {
        (**self).read_control()
    }

    fn read_status(&mut self) -> Result<u8> {
        (**self).read_status()
    }
}

/// Determines the device node to open.
///
/// Uses `path` if given, then the `XCPORT` environment variable, then [`DEFAULT_DEVICE`].
///
/// [`DEFAULT_DEVICE`]: constant.DEFAULT_DEVICE.html
pub fn device_path(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) => path.to_path_buf(),
        None => env::var_os(DEVICE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE)),
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use crate::error::ResultExt as _;
    use crate::{Error, ErrorKind, Result, Transport};
    use log::{debug, warn};
    use std::fs::{File, OpenOptions};
    use std::os::raw::c_int;
    use std::os::unix::io::AsRawFd;
    use std::path::{Path, PathBuf};
    use std::fmt;

    const PP_IOCTL: u8 = b'p';
    const IEEE1284_MODE_COMPAT: c_int = 0;

    nix::ioctl_read!(pp_rstatus, PP_IOCTL, 0x81, u8);
    nix::ioctl_read!(pp_rcontrol, PP_IOCTL, 0x83, u8);
    nix::ioctl_write_ptr!(pp_wcontrol, PP_IOCTL, 0x84, u8);
    nix::ioctl_write_ptr!(pp_wdata, PP_IOCTL, 0x86, u8);
    nix::ioctl_none!(pp_claim, PP_IOCTL, 0x8b);
    nix::ioctl_none!(pp_release, PP_IOCTL, 0x8c);
    nix::ioctl_write_ptr!(pp_negot, PP_IOCTL, 0x91, c_int);

    pub type SystemPort = Ppdev;

    /// A parallel port accessed through the Linux `ppdev` driver.
    ///
    /// The port is claimed for exclusive use while this value exists.
    pub struct Ppdev {
        file: File,
        path: PathBuf,
    }

    impl Ppdev {
        /// Opens and claims `path`, and switches it to IEEE 1284 compatibility mode.
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| {
                    Error::new(
                        ErrorKind::DeviceOpen,
                        format!("'{}': {}", path.display(), e),
                    )
                })?;

            // SAFETY: `file` is an open descriptor for the lifetime of the call.
            unsafe { pp_claim(file.as_raw_fd()) }.map_err(|e| {
                Error::new(
                    ErrorKind::DeviceOpen,
                    format!("port {} already in use ({})", path.display(), e),
                )
            })?;

            // Past this point, dropping `port` releases the claim.
            let port = Self {
                file,
                path: path.to_path_buf(),
            };

            let mode = IEEE1284_MODE_COMPAT;
            // SAFETY: `mode` outlives the call.
            unsafe { pp_negot(port.fd(), &mode) }.map_err(|e| {
                Error::new(
                    ErrorKind::ModeNegotiation,
                    format!("{} ({})", port.path.display(), e),
                )
            })?;

            debug!("claimed {}", port.path.display());
            Ok(port)
        }

        fn fd(&self) -> c_int {
            self.file.as_raw_fd()
        }
    }

    impl Transport for Ppdev {
        fn write_data(&mut self, data: u8) -> Result<()> {
            // SAFETY: pointer to a local that outlives the call.
            unsafe { pp_wdata(self.fd(), &data) }.jtag_err_while("writing data")?;
            Ok(())
        }

        fn write_control(&mut self, control: u8) -> Result<()> {
            // SAFETY: pointer to a local that outlives the call.
            unsafe { pp_wcontrol(self.fd(), &control) }.jtag_err_while("writing control")?;
            Ok(())
        }

        fn read_control(&mut self) -> Result<u8> {
            let mut control = 0;
            // SAFETY: pointer to a local that outlives the call.
            unsafe { pp_rcontrol(self.fd(), &mut control) }.jtag_err_while("reading control")?;
            Ok(control)
        }

        fn read_status(&mut self) -> Result<u8> {
            let mut status = 0;
            // SAFETY: pointer to a local that outlives the call.
            unsafe { pp_rstatus(self.fd(), &mut status) }.jtag_err_while("reading status")?;
            Ok(status)
        }
    }

    impl Drop for Ppdev {
        fn drop(&mut self) {
            // SAFETY: `file` is still open here.
            if let Err(e) = unsafe { pp_release(self.fd()) } {
                warn!("failed to release {}: {}", self.path.display(), e);
            }
            // `file` is closed after this
        }
    }

    impl fmt::Debug for Ppdev {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Ppdev").field("path", &self.path).finish()
        }
    }
}

#[cfg(target_os = "freebsd")]
mod sys {
    use crate::error::ResultExt as _;
    use crate::{Error, ErrorKind, Result, Transport};
    use std::fs::{File, OpenOptions};
    use std::os::raw::c_int;
    use std::os::unix::io::AsRawFd;
    use std::path::{Path, PathBuf};
    use std::fmt;

    const PPI_IOCTL: u8 = b'P';

    nix::ioctl_read!(ppi_gstatus, PPI_IOCTL, 11, u8);
    nix::ioctl_read!(ppi_gctrl, PPI_IOCTL, 12, u8);
    nix::ioctl_write_ptr!(ppi_sdata, PPI_IOCTL, 16, u8);
    nix::ioctl_write_ptr!(ppi_sctrl, PPI_IOCTL, 18, u8);

    pub type SystemPort = Ppi;

    /// A parallel port accessed through the FreeBSD `ppi` driver.
    ///
    /// `ppi` grants exclusive access on open, so there is no separate claim step.
    pub struct Ppi {
        file: File,
        path: PathBuf,
    }

    impl Ppi {
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| {
                    Error::new(
                        ErrorKind::DeviceOpen,
                        format!("'{}': {}", path.display(), e),
                    )
                })?;
            Ok(Self {
                file,
                path: path.to_path_buf(),
            })
        }

        fn fd(&self) -> c_int {
            self.file.as_raw_fd()
        }
    }

    impl Transport for Ppi {
        fn write_data(&mut self, data: u8) -> Result<()> {
            // SAFETY: pointer to a local that outlives the call.
            unsafe { ppi_sdata(self.fd(), &data) }.jtag_err_while("writing data")?;
            Ok(())
        }

        fn write_control(&mut self, control: u8) -> Result<()> {
            // SAFETY: pointer to a local that outlives the call.
            unsafe { ppi_sctrl(self.fd(), &control) }.jtag_err_while("writing control")?;
            Ok(())
        }

        fn read_control(&mut self) -> Result<u8> {
            let mut control = 0;
            // SAFETY: pointer to a local that outlives the call.
            unsafe { ppi_gctrl(self.fd(), &mut control) }.jtag_err_while("reading control")?;
            Ok(control)
        }

        fn read_status(&mut self) -> Result<u8> {
            let mut status = 0;
            // SAFETY: pointer to a local that outlives the call.
            unsafe { ppi_gstatus(self.fd(), &mut status) }.jtag_err_while("reading status")?;
            Ok(status)
        }
    }

    impl fmt::Debug for Ppi {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Ppi").field("path", &self.path).finish()
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::vdm_status;
    use crate::error::ResultExt as _;
    use crate::{Error, ErrorKind, Result, Transport};
    use std::ffi::c_void;
    use std::fs::{File, OpenOptions};
    use std::os::windows::io::AsRawHandle;
    use std::path::{Path, PathBuf};
    use std::{fmt, io, ptr};
    use windows_sys::Win32::System::IO::DeviceIoControl;

    const FILE_DEVICE_VDM: u32 = 0x2c;

    /// `CTL_CODE` with `METHOD_BUFFERED` and `FILE_ANY_ACCESS`.
    const fn ctl_code(device: u32, function: u32) -> u32 {
        (device << 16) | (function << 2)
    }

    const VDM_PAR_DATA: u32 = ctl_code(FILE_DEVICE_VDM, 16);
    const VDM_PAR_CONTROL: u32 = ctl_code(FILE_DEVICE_VDM, 17);
    const VDM_PAR_STATUS: u32 = ctl_code(FILE_DEVICE_VDM, 18);

    pub type SystemPort = Vdm;

    /// A parallel port accessed through the Windows `$VDMLPT` device.
    ///
    /// Status reads are converted to PC register values, see [`Transport`].
    ///
    /// [`Transport`]: ../trait.Transport.html
    pub struct Vdm {
        file: File,
        path: PathBuf,
    }

    impl Vdm {
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| {
                    Error::new(
                        ErrorKind::DeviceOpen,
                        format!("'{}': {}", path.display(), e),
                    )
                })?;
            Ok(Self {
                file,
                path: path.to_path_buf(),
            })
        }

        /// Issues one device control call with an optional 1-byte input and output buffer.
        fn control(
            &self,
            code: u32,
            input: Option<&u8>,
            output: Option<&mut u8>,
        ) -> io::Result<()> {
            let (inp, inlen) = match input {
                Some(byte) => (byte as *const u8 as *const c_void, 1),
                None => (ptr::null(), 0),
            };
            let (out, outlen) = match output {
                Some(byte) => (byte as *mut u8 as *mut c_void, 1),
                None => (ptr::null_mut(), 0),
            };
            let mut returned = 0u32;
            // SAFETY: the buffers are valid for their stated lengths for the duration of the
            // call, `file` keeps the handle open, and the call is synchronous.
            let ok = unsafe {
                DeviceIoControl(
                    self.file.as_raw_handle(),
                    code,
                    inp,
                    inlen,
                    out,
                    outlen,
                    &mut returned,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    }

    impl Transport for Vdm {
        fn write_data(&mut self, data: u8) -> Result<()> {
            self.control(VDM_PAR_DATA, Some(&data), None)
                .jtag_err_while("writing data")
        }

        fn write_control(&mut self, control: u8) -> Result<()> {
            self.control(VDM_PAR_CONTROL, Some(&control), None)
                .jtag_err_while("writing control")
        }

        fn read_control(&mut self) -> Result<u8> {
            let mut control = 0;
            self.control(VDM_PAR_CONTROL, None, Some(&mut control))
                .jtag_err_while("reading control")?;
            Ok(control)
        }

        fn read_status(&mut self) -> Result<u8> {
            let mut raw = 0;
            self.control(VDM_PAR_STATUS, None, Some(&mut raw))
                .jtag_err_while("reading status")?;
            Ok(vdm_status(raw))
        }
    }

    impl fmt::Debug for Vdm {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Vdm").field("path", &self.path).finish()
        }
    }
}

/// A simulated port for tests.
///
/// The status register is computed from the current data byte by a "wiring" function, and every
/// register access is appended to a shared log that outlives the port.
#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use crate::{Error, ErrorKind, Result};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Access {
        WriteData(u8),
        WriteControl(u8),
        ReadControl(u8),
        ReadStatus(u8),
        Release,
    }

    pub type Log = Rc<RefCell<Vec<Access>>>;

    pub struct MockPort {
        data: u8,
        control: u8,
        wiring: Box<dyn FnMut(u8) -> u8>,
        log: Log,
        /// Fail every access after this many have succeeded.
        fail_after: Option<usize>,
    }

    impl MockPort {
        pub fn new(wiring: impl FnMut(u8) -> u8 + 'static) -> Self {
            Self {
                // Anything but the idle byte, so the first write is visible.
                data: 0xff,
                control: 0x00,
                wiring: Box::new(wiring),
                log: Log::default(),
                fail_after: None,
            }
        }

        /// A port whose status register never changes.
        pub fn stuck(status: u8) -> Self {
            Self::new(move |_| status)
        }

        /// ByteBlaster: D7 loops to PAPEROUT, D5 to nACK, nERROR is grounded. TDO (BUSY) is
        /// driven from TDI (D6) through the inverting BUSY input, as if a single flip-flop sat in
        /// the chain with zero delay.
        pub fn byteblaster() -> Self {
            Self::new(byteblaster_wiring)
        }

        /// Parallel Cable III: D6 feeds BUSY and PAPEROUT, nERROR is high, TDO (SELECT) follows
        /// TDI (D0).
        pub fn parallel_cable_iii() -> Self {
            Self::new(pc3_wiring)
        }

        pub fn failing_after(mut self, accesses: usize) -> Self {
            self.fail_after = Some(accesses);
            self
        }

        pub fn log(&self) -> Log {
            self.log.clone()
        }

        fn record(&mut self, access: Access) -> Result<()> {
            if let Some(n) = self.fail_after {
                if self.log.borrow().len() >= n {
                    return Err(Error::new(
                        ErrorKind::RegisterIo,
                        format!("simulated failure on {:?}", access),
                    ));
                }
            }
            self.log.borrow_mut().push(access);
            Ok(())
        }
    }

    pub fn byteblaster_wiring(data: u8) -> u8 {
        let mut status = 0x10;
        if data & 0x80 != 0 {
            status |= 0x20;
        }
        if data & 0x20 != 0 {
            status |= 0x40;
        }
        if data & 0x40 == 0 {
            status |= 0x80;
        }
        status
    }

    pub fn pc3_wiring(data: u8) -> u8 {
        let mut status = 0x08;
        if data & 0x40 != 0 {
            status |= 0x20;
        } else {
            status |= 0x80;
        }
        if data & 0x01 != 0 {
            status |= 0x10;
        }
        status
    }

    impl Transport for MockPort {
        fn write_data(&mut self, data: u8) -> Result<()> {
            self.record(Access::WriteData(data))?;
            self.data = data;
            Ok(())
        }

        fn write_control(&mut self, control: u8) -> Result<()> {
            self.record(Access::WriteControl(control))?;
            self.control = control;
            Ok(())
        }

        fn read_control(&mut self) -> Result<u8> {
            let control = self.control;
            self.record(Access::ReadControl(control))?;
            Ok(control)
        }

        fn read_status(&mut self) -> Result<u8> {
            let status = (self.wiring)(self.data);
            self.record(Access::ReadStatus(status))?;
            Ok(status)
        }
    }

    impl Drop for MockPort {
        fn drop(&mut self) {
            self.log.borrow_mut().push(Access::Release);
        }
    }
}
