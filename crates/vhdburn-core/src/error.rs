//! Error types for VHD inspection and boot sector burning

use thiserror::Error;

/// The main error type for vhdburn operations
#[derive(Error, Debug)]
pub enum Error {
    /// OS-level failure while seeking, reading or writing the image
    #[error("Image I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The trailing 512 bytes do not start with "conectix"
    #[error("Invalid hard disk footer cookie: expected 'conectix', got '{0}'")]
    InvalidFooterCookie(String),

    /// The 1024 bytes at offset 512 do not start with "cxsparse"
    #[error("Invalid dynamic disk header cookie: expected 'cxsparse', got '{0}'")]
    InvalidHeaderCookie(String),

    /// The file is too short to hold the structure being decoded
    #[error("Truncated image: {0}")]
    Truncated(String),

    /// Field slice outside the buffer it was read from
    #[error("Field range {start}..{end} is invalid for a {len}-byte buffer")]
    Range { start: usize, end: usize, len: usize },

    /// Boot sector payload longer than one sector
    #[error("Boot sector payload too large: {size} bytes (maximum {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Burning was refused because the image is not a fixed VHD
    #[error("Not a fixed disk image: {0}")]
    NotFixedDiskImage(String),

    /// A buffer would exceed the configured allocation limit
    #[error("Allocation limit exceeded: {0}")]
    AllocationLimit(String),
}

/// Result type alias for vhdburn operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid footer cookie error from the bytes that were found
    pub fn invalid_footer_cookie(found: &[u8]) -> Self {
        Error::InvalidFooterCookie(String::from_utf8_lossy(found).into_owned())
    }

    /// Create an invalid header cookie error from the bytes that were found
    pub fn invalid_header_cookie(found: &[u8]) -> Self {
        Error::InvalidHeaderCookie(String::from_utf8_lossy(found).into_owned())
    }

    /// Create a truncated image error
    pub fn truncated(msg: impl Into<String>) -> Self {
        Error::Truncated(msg.into())
    }

    /// Create a not-fixed-disk refusal
    pub fn not_fixed_disk(msg: impl Into<String>) -> Self {
        Error::NotFixedDiskImage(msg.into())
    }

    /// True for malformed on-disk structures.
    ///
    /// The classifier recovers these into an unrecognized image; everything
    /// else (notably `Io`) propagates to the caller.
    pub fn is_format_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFooterCookie(_) | Error::InvalidHeaderCookie(_) | Error::Truncated(_)
        )
    }
}
