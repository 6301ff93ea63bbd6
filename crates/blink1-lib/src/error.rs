//! Unified error type for the blink1-lib crate.
//!
//! [`Blink1Error`] wraps [`DeviceError`] and the domain-specific error kinds
//! (`Color`, `Pattern`, `Config`, `Argument`). `From` impls allow `?` to propagate across
//! module boundaries.

use std::fmt;

use crate::device::DeviceError;

/// Unified error type for blink1-lib operations.
#[derive(Debug)]
pub enum Blink1Error {
    /// Device communication error (enumerate, open, report exchange).
    Device(DeviceError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Color parsing error (strict parsing only).
    Color(String),
    /// Pattern parsing or capacity error.
    Pattern(String),
    /// Configuration validation error.
    Config(String),
    /// A caller-supplied value outside what the device accepts.
    Argument(String),
}

impl Blink1Error {
    /// True when the root cause is that no device could be found.
    pub fn is_no_device(&self) -> bool {
        matches!(self, Blink1Error::Device(DeviceError::NotFound))
    }
}

impl fmt::Display for Blink1Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blink1Error::Device(e) => write!(f, "{e}"),
            Blink1Error::Io(e) => write!(f, "I/O error: {e}"),
            Blink1Error::Color(e) => write!(f, "Color error: {e}"),
            Blink1Error::Pattern(e) => write!(f, "Pattern error: {e}"),
            Blink1Error::Config(e) => write!(f, "Config error: {e}"),
            Blink1Error::Argument(e) => write!(f, "Invalid argument: {e}"),
        }
    }
}

impl std::error::Error for Blink1Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Blink1Error::Device(e) => Some(e),
            Blink1Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for Blink1Error {
    fn from(e: DeviceError) -> Self {
        Blink1Error::Device(e)
    }
}

impl From<std::io::Error> for Blink1Error {
    fn from(e: std::io::Error) -> Self {
        Blink1Error::Io(e)
    }
}

/// Crate-level Result alias using [`Blink1Error`].
pub type Result<T> = std::result::Result<T, Blink1Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_device_error() {
        let e: Blink1Error = DeviceError::NotFound.into();
        assert!(matches!(e, Blink1Error::Device(DeviceError::NotFound)));
        assert!(e.is_no_device());
    }

    #[test]
    fn other_device_errors_are_not_no_device() {
        let e: Blink1Error = DeviceError::WriteFailed("pipe".into()).into();
        assert!(!e.is_no_device());
        assert!(!Blink1Error::Pattern("x".into()).is_no_device());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Blink1Error = io_err.into();
        assert!(matches!(e, Blink1Error::Io(_)));
    }

    #[test]
    fn display_device_error() {
        let e = Blink1Error::Device(DeviceError::NotFound);
        assert_eq!(e.to_string(), "no blink(1) devices found");
    }

    #[test]
    fn display_string_variants() {
        assert_eq!(
            Blink1Error::Color("bad hex".into()).to_string(),
            "Color error: bad hex"
        );
        assert_eq!(
            Blink1Error::Pattern("empty".into()).to_string(),
            "Pattern error: empty"
        );
        assert_eq!(
            Blink1Error::Config("bad port".into()).to_string(),
            "Config error: bad port"
        );
    }

    #[test]
    fn source_chains_device_error() {
        let e = Blink1Error::Device(DeviceError::ReadFailed("timeout".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("timeout"));
    }

    #[test]
    fn source_none_for_string_variants() {
        let e = Blink1Error::Pattern("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_device_to_blink1() {
        fn inner() -> crate::device::Result<()> {
            Err(DeviceError::NotFound)
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(err, Blink1Error::Device(DeviceError::NotFound)));
    }
}
