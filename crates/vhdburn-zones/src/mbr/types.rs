//! Boot sector construction and burn results

use serde::Serialize;
use std::fmt;
use std::io::SeekFrom;
use vhdburn_core::{Error, ReadSeek, Result};

const SECTOR_SIZE: usize = 512;

/// A 512-byte MBR boot sector ready to be written
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0x000   510   Payload, zero padded
/// 0x1FE   2     Boot signature 55 AA
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSector {
    bytes: [u8; SECTOR_SIZE],
    payload_len: usize,
    warnings: Vec<BurnWarning>,
}

impl BootSector {
    /// Size of a boot sector in bytes (always 512)
    pub const SIZE: usize = SECTOR_SIZE;

    /// Room for boot code ahead of the signature
    pub const CODE_SIZE: usize = 0x1FE;

    /// Offset of the boot signature
    pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

    /// Boot signature bytes as they appear on disk
    pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

    /// Build a sector from a caller-supplied payload.
    ///
    /// Accepted payloads are either boot code alone (up to 510 bytes) or a
    /// whole sector (exactly 512 bytes). The payload is copied to the head of
    /// a zeroed sector and the last two bytes are then forced to `55 AA`.
    /// A whole-sector payload that did not carry the signature itself
    /// produces a [`BurnWarning::MissingBootSignature`] advisory.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] for 511 bytes (the last byte would land on
    /// the signature) and for anything longer than 512 bytes.
    pub fn build(payload: &[u8]) -> Result<Self> {
        let max = match payload.len() {
            len if len <= Self::CODE_SIZE || len == Self::SIZE => None,
            len if len < Self::SIZE => Some(Self::CODE_SIZE),
            _ => Some(Self::SIZE),
        };
        if let Some(max) = max {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let mut warnings = Vec::new();
        if payload.len() == Self::SIZE {
            let found = [
                payload[Self::BOOT_SIGNATURE_OFFSET],
                payload[Self::BOOT_SIGNATURE_OFFSET + 1],
            ];
            if found != Self::BOOT_SIGNATURE {
                tracing::warn!(
                    "Payload lacks boot signature (found {:02X} {:02X}), forcing 55 AA",
                    found[0],
                    found[1]
                );
                warnings.push(BurnWarning::MissingBootSignature { found });
            }
        }

        let mut bytes = [0u8; Self::SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        bytes[Self::BOOT_SIGNATURE_OFFSET..].copy_from_slice(&Self::BOOT_SIGNATURE);

        Ok(Self {
            bytes,
            payload_len: payload.len(),
            warnings,
        })
    }

    pub fn bytes(&self) -> &[u8; Self::SIZE] {
        &self.bytes
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Advisories raised while building the sector
    pub fn warnings(&self) -> &[BurnWarning] {
        &self.warnings
    }

    /// Read the two signature bytes of sector 0 from `stream`
    pub fn read_signature(stream: &mut dyn ReadSeek) -> Result<[u8; 2]> {
        stream.seek(SeekFrom::Start(Self::BOOT_SIGNATURE_OFFSET as u64))?;
        let mut sig = [0u8; 2];
        stream.read_exact(&mut sig)?;
        Ok(sig)
    }
}

/// Non-fatal advisory attached to a successful burn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BurnWarning {
    /// A full-sector payload did not end in `55 AA`; the signature was forced
    MissingBootSignature { found: [u8; 2] },
}

impl fmt::Display for BurnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBootSignature { found } => write!(
                f,
                "payload ended in {:02X} {:02X} instead of 55 AA; signature was forced",
                found[0], found[1]
            ),
        }
    }
}

/// What a burn request ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BurnOutcome {
    /// The sector was written
    Written(BurnReport),
    /// The caller declined; no bytes were touched
    WriteSkipped,
}

impl BurnOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Details of a completed write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnReport {
    /// File offset the sector was written at
    pub offset: u64,
    /// Length of the caller's payload
    pub payload_len: usize,
    /// Where the footer copy was rewritten (dynamic images only)
    pub footer_copy_offset: Option<u64>,
    pub warnings: Vec<BurnWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_short_payload_is_padded_and_signed() {
        let payload = vec![0xEBu8; 100];
        let sector = BootSector::build(&payload).unwrap();
        let bytes = sector.bytes();

        assert_eq!(&bytes[..100], &payload[..]);
        assert!(bytes[100..510].iter().all(|&b| b == 0));
        assert_eq!(&bytes[510..], &[0x55, 0xAA]);
        assert!(sector.warnings().is_empty());
        assert_eq!(sector.payload_len(), 100);
    }

    #[test]
    fn test_empty_payload() {
        let sector = BootSector::build(&[]).unwrap();
        assert!(sector.bytes()[..510].iter().all(|&b| b == 0));
        assert_eq!(&sector.bytes()[510..], &BootSector::BOOT_SIGNATURE);
    }

    #[test]
    fn test_full_payload_with_signature_has_no_warning() {
        let mut payload = vec![0x90u8; 512];
        payload[510] = 0x55;
        payload[511] = 0xAA;
        let sector = BootSector::build(&payload).unwrap();
        assert!(sector.warnings().is_empty());
        assert_eq!(&sector.bytes()[..], &payload[..]);
    }

    #[test]
    fn test_full_payload_without_signature_is_forced() {
        let payload = vec![0x90u8; 512];
        let sector = BootSector::build(&payload).unwrap();

        assert_eq!(&sector.bytes()[510..], &[0x55, 0xAA]);
        assert_eq!(
            sector.warnings(),
            &[BurnWarning::MissingBootSignature { found: [0x90, 0x90] }]
        );
    }

    #[test]
    fn test_510_byte_payload_fills_code_area() {
        let payload = vec![0x11u8; 510];
        let sector = BootSector::build(&payload).unwrap();
        assert_eq!(&sector.bytes()[..510], &payload[..]);
        assert_eq!(&sector.bytes()[510..], &[0x55, 0xAA]);
        assert!(sector.warnings().is_empty());
    }

    #[test]
    fn test_511_byte_payload_rejected() {
        let result = BootSector::build(&[0x11u8; 511]);
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { size: 511, max: 510 })
        ));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let result = BootSector::build(&[0u8; 513]);
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { size: 513, max: 512 })
        ));
    }

    #[test]
    fn test_read_signature() {
        let mut disk = vec![0u8; 1024];
        disk[510] = 0x55;
        disk[511] = 0xAA;
        let mut cursor = Cursor::new(disk);
        assert_eq!(BootSector::read_signature(&mut cursor).unwrap(), [0x55, 0xAA]);
    }

    #[test]
    fn test_warning_display() {
        let warning = BurnWarning::MissingBootSignature { found: [0x00, 0x01] };
        assert!(warning.to_string().contains("00 01"));
    }
}
