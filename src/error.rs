use crate::detect::Rejection;
use std::fmt;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// List of specific errors that may occur when using this library.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The parallel port device node could not be opened or claimed.
    ///
    /// This may indicate that the path does not exist, that the current user does not have
    /// permission to access it, or that another process (or the printer driver) holds the port.
    DeviceOpen,

    /// The port could not be switched to IEEE 1284 compatibility mode.
    ModeNegotiation,

    /// No supported cable was found on the port.
    ///
    /// The error wraps a [`Rejection`] describing which detection check failed. All detection
    /// failures are reported with this kind; the session cannot be used.
    ///
    /// [`Rejection`]: enum.Rejection.html
    NoCable,

    /// A single access to the data, status or control register failed.
    ///
    /// This usually means the device was disconnected or reclaimed by the operating system. It is
    /// never retried, since continuing to clock bits after a failed access would corrupt the
    /// stream sent to the target.
    RegisterIo,

    /// An unspecified error occurred.
    Other,
}

pub(crate) trait Cause {
    const KIND: ErrorKind;
}

/// The error type used by this library.
///
/// Errors can be introspected by the user by calling [`Error::kind`] and inspecting the returned
/// [`ErrorKind`].
///
/// [`Error::kind`]: #method.kind
/// [`ErrorKind`]: enum.ErrorKind.html
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    inner: BoxedError,
    while_: Option<&'static str>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, inner: impl Into<BoxedError>) -> Self {
        Self {
            kind,
            inner: inner.into(),
            while_: None,
        }
    }

    pub(crate) fn with_while(
        kind: ErrorKind,
        inner: impl Into<BoxedError>,
        while_: &'static str,
    ) -> Self {
        Self {
            kind,
            inner: inner.into(),
            while_: Some(while_),
        }
    }

    /// Returns the [`ErrorKind`] describing this error.
    ///
    /// [`ErrorKind`]: enum.ErrorKind.html
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detection failure wrapped by a [`NoCable`] error.
    ///
    /// [`NoCable`]: enum.ErrorKind.html#variant.NoCable
    pub fn rejection(&self) -> Option<&Rejection> {
        self.inner.downcast_ref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Prefix foreign errors with further explanation where they're coming from
        let what = match self.kind {
            ErrorKind::RegisterIo => "parallel port register access failed",
            ErrorKind::DeviceOpen => "could not access parallel port",
            ErrorKind::ModeNegotiation => "IEEE 1284 compatibility mode not available",
            ErrorKind::NoCable => "no JTAG cable found",
            ErrorKind::Other => return self.inner.fmt(f),
        };

        if let Some(while_) = self.while_ {
            write!(f, "{} while {}: {}", what, while_, self.inner)
        } else {
            write!(f, "{}: {}", what, self.inner)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

pub(crate) trait ResultExt<T, E> {
    fn jtag_err(self) -> Result<T, Error>
    where
        E: Cause + Into<BoxedError>;

    fn jtag_err_while(self, while_: &'static str) -> Result<T, Error>
    where
        E: Cause + Into<BoxedError>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn jtag_err(self) -> Result<T, Error>
    where
        E: Cause + Into<BoxedError>,
    {
        self.map_err(|e| Error::new(E::KIND, e))
    }

    fn jtag_err_while(self, while_: &'static str) -> Result<T, Error>
    where
        E: Cause + Into<BoxedError>,
    {
        self.map_err(|e| Error::with_while(E::KIND, e, while_))
    }
}

macro_rules! error_mapping {
    (
        $(
            $(#[$attr:meta])*
            $errty:ty => $kind:ident,
        )+
    ) => {
        $(
            $(#[$attr])*
            impl Cause for $errty {
                const KIND: ErrorKind = ErrorKind::$kind;
            }
        )+
    };
}

error_mapping! {
    Rejection => NoCable,
    #[cfg(unix)]
    nix::errno::Errno => RegisterIo,
    #[cfg(windows)]
    std::io::Error => RegisterIo,
    String => Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::with_while(ErrorKind::RegisterIo, "EIO".to_string(), "reading status");
        assert_eq!(
            err.to_string(),
            "parallel port register access failed while reading status: EIO"
        );

        let err = Error::new(ErrorKind::Other, "something else".to_string());
        assert_eq!(err.to_string(), "something else");
    }

    #[test]
    fn rejection_is_recoverable() {
        let err: Result<(), _> = Err(Rejection::NoDongle);
        let err = err.jtag_err().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCable);
        assert_eq!(err.rejection(), Some(&Rejection::NoDongle));
    }
}
