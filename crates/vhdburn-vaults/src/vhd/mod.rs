//! VHD (Virtual Hard Disk) image classification
//!
//! This module inspects Microsoft VHD 1.0 images and decides which variant
//! they are.
//!
//! ## Format Overview
//!
//! ```text
//! Fixed:    | data ...................................... | footer (512) |
//! Dynamic:  | footer copy (512) | header (1024) | BAT | blocks ... | footer (512) |
//! ```
//!
//! - Fixed VHDs: data offset starts with `FF FF FF FF` and disk type is 2
//! - Dynamic VHDs: a "cxsparse" header at offset 512

pub mod layout;
pub mod types;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::SeekFrom;
use uuid::Uuid;
use vhdburn_core::{DiskVariant, ReadSeek, Result};
use types::{BlockAllocationTable, DynamicDiskHeader, HardDiskFooter};

use crate::VaultConfig;

/// A classified VHD image
///
/// Built once per open file handle. The footer and header views own copies
/// of the bytes they were decoded from; nothing here borrows the file.
#[derive(Debug, Clone)]
pub struct VhdImage {
    file_len: u64,
    footer: Option<HardDiskFooter>,
    header: Option<DynamicDiskHeader>,
    variant: DiskVariant,
    dynamic: bool,
}

impl VhdImage {
    /// Classify the image behind `file`.
    ///
    /// A footer or header that fails verification leaves that structure
    /// absent; the image then reports as unrecognized rather than failing.
    ///
    /// # Errors
    ///
    /// Only I/O errors from seeking or reading `file` are returned.
    pub fn classify(file: &mut dyn ReadSeek, config: &VaultConfig) -> Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;

        let footer = match HardDiskFooter::decode(&mut *file) {
            Ok(footer) => Some(footer),
            Err(e) if e.is_format_violation() => {
                tracing::debug!("No VHD footer: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let header = match &footer {
            Some(footer) => match DynamicDiskHeader::decode(&mut *file, footer) {
                Ok(header) => Some(header),
                Err(e) if e.is_format_violation() => {
                    tracing::debug!("No dynamic disk header: {}", e);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let fixed = footer.as_ref().is_some_and(HardDiskFooter::is_fixed_disk);

        // Header presence alone marks a dynamic image unless strict mode also
        // asks the footer to agree.
        let dynamic = match (&footer, &header) {
            (Some(footer), Some(_)) => !config.strict_dynamic || footer.disk_type().is_sparse(),
            _ => false,
        };

        let variant = if fixed {
            DiskVariant::Fixed
        } else if dynamic {
            match footer.as_ref().map(HardDiskFooter::disk_type) {
                Some(types::DiskType::Differencing) => DiskVariant::DifferencingDisk,
                _ => DiskVariant::Dynamic,
            }
        } else {
            DiskVariant::Unrecognized
        };

        if footer.is_some() && !variant.is_recognized() {
            tracing::warn!("VHD footer verified but image is neither fixed nor dynamic");
        }
        tracing::debug!(?variant, file_len, "Classified image");

        Ok(Self {
            file_len,
            footer,
            header,
            variant,
            dynamic,
        })
    }

    /// The classification computed when the image was inspected
    pub fn variant(&self) -> DiskVariant {
        self.variant
    }

    /// Verified footer with the fixed disk sentinel and disk type 2
    pub fn is_fixed(&self) -> bool {
        self.variant == DiskVariant::Fixed
    }

    /// Sparse header present (and, in strict mode, a sparse disk type)
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Length of the file at classification time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn footer(&self) -> Option<&HardDiskFooter> {
        self.footer.as_ref()
    }

    pub fn header(&self) -> Option<&DynamicDiskHeader> {
        self.header.as_ref()
    }

    /// The BAT span, when a header is present
    pub fn bat(&self) -> Option<BlockAllocationTable> {
        self.header.as_ref().map(DynamicDiskHeader::bat)
    }

    /// Serializable report of everything that was decoded
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            variant: self.variant,
            file_len: self.file_len,
            fixed: self.is_fixed(),
            dynamic: self.is_dynamic(),
            footer: self.footer.as_ref().map(FooterSummary::from),
            header: self.header.as_ref().map(HeaderSummary::from),
        }
    }
}

/// Report of a classified image
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub variant: DiskVariant,
    pub file_len: u64,
    pub fixed: bool,
    pub dynamic: bool,
    pub footer: Option<FooterSummary>,
    pub header: Option<HeaderSummary>,
}

/// Footer fields in display form
#[derive(Debug, Clone, Serialize)]
pub struct FooterSummary {
    pub features: u32,
    pub format_version: u32,
    pub data_offset: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub creator_application: String,
    pub creator_version: u32,
    pub creator_host_os: String,
    pub original_size: u64,
    pub current_size: u64,
    pub geometry: String,
    pub disk_type: String,
    pub checksum: u32,
    pub unique_id: Uuid,
    pub saved_state: u8,
}

impl From<&HardDiskFooter> for FooterSummary {
    fn from(footer: &HardDiskFooter) -> Self {
        Self {
            features: footer.features(),
            format_version: footer.format_version(),
            data_offset: footer.data_offset_value(),
            timestamp: footer.timestamp_utc(),
            creator_application: footer.creator_application(),
            creator_version: footer.creator_version(),
            creator_host_os: footer.creator_host_os(),
            original_size: footer.original_size(),
            current_size: footer.current_size(),
            geometry: footer.geometry().to_string(),
            disk_type: footer.disk_type().to_string(),
            checksum: footer.checksum(),
            unique_id: footer.unique_id(),
            saved_state: footer.saved_state(),
        }
    }
}

/// Dynamic header fields in display form
#[derive(Debug, Clone, Serialize)]
pub struct HeaderSummary {
    pub data_offset: u64,
    pub table_offset: u64,
    pub header_version: u32,
    pub max_table_entries: u32,
    pub block_size: u32,
    pub checksum: u32,
    pub parent_unique_id: Uuid,
    pub parent_timestamp: u32,
    pub parent_name: String,
    pub bat_byte_size: u64,
}

impl From<&DynamicDiskHeader> for HeaderSummary {
    fn from(header: &DynamicDiskHeader) -> Self {
        Self {
            data_offset: header.data_offset(),
            table_offset: header.table_offset(),
            header_version: header.header_version(),
            max_table_entries: header.max_table_entries(),
            block_size: header.block_size(),
            checksum: header.checksum(),
            parent_unique_id: header.parent_unique_id(),
            parent_timestamp: header.parent_timestamp(),
            parent_name: header.parent_name(),
            bat_byte_size: header.bat().byte_size(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;
    use types::tests::{footer_bytes, header_bytes};

    /// Fixed image: `data_size` bytes of data followed by the footer
    pub(crate) fn fixed_image(data_size: usize) -> Vec<u8> {
        let mut image: Vec<u8> = (0..data_size).map(|i| (i % 256) as u8).collect();
        image.extend_from_slice(&footer_bytes(2, u64::MAX));
        image
    }

    /// Dynamic image: footer copy, header, BAT, one data sector, footer
    pub(crate) fn dynamic_image(disk_type: u32, entries: u32) -> Vec<u8> {
        let footer = footer_bytes(disk_type, 512);
        let mut image = footer.to_vec();
        image.extend_from_slice(&header_bytes(entries));
        for i in 0..entries {
            let entry = if i % 2 == 0 { 0xFFFF_FFFFu32 } else { i };
            image.extend_from_slice(&entry.to_be_bytes());
        }
        image.extend_from_slice(&[0u8; 512]);
        image.extend_from_slice(&footer);
        image
    }

    fn classify_bytes(image: Vec<u8>, config: &VaultConfig) -> VhdImage {
        let mut cursor = Cursor::new(image);
        VhdImage::classify(&mut cursor, config).unwrap()
    }

    #[test]
    fn test_fixed_image_is_fixed_not_dynamic() {
        let image = classify_bytes(fixed_image(4096), &VaultConfig::default());
        assert!(image.is_fixed());
        assert!(!image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::Fixed);
        assert!(image.header().is_none());
        assert!(image.bat().is_none());
    }

    #[test]
    fn test_dynamic_image_is_dynamic_not_fixed() {
        let image = classify_bytes(dynamic_image(3, 100), &VaultConfig::default());
        assert!(image.is_dynamic());
        assert!(!image.is_fixed());
        assert_eq!(image.variant(), DiskVariant::Dynamic);
        assert_eq!(image.bat().unwrap().byte_size(), 400);
    }

    #[test]
    fn test_differencing_image_variant() {
        let image = classify_bytes(dynamic_image(4, 8), &VaultConfig::default());
        assert!(image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::DifferencingDisk);
    }

    #[test]
    fn test_wrong_footer_cookie_is_unrecognized() {
        let mut bytes = fixed_image(4096);
        let len = bytes.len();
        bytes[len - 512..len - 504].copy_from_slice(b"notvalid");

        let image = classify_bytes(bytes, &VaultConfig::default());
        assert!(!image.is_fixed());
        assert!(!image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::Unrecognized);
        assert!(image.footer().is_none());
    }

    #[test]
    fn test_tiny_file_is_unrecognized() {
        let image = classify_bytes(vec![0u8; 10], &VaultConfig::default());
        assert_eq!(image.variant(), DiskVariant::Unrecognized);
        assert_eq!(image.file_len(), 10);
    }

    #[test]
    fn test_bad_header_cookie_leaves_header_absent() {
        let mut bytes = dynamic_image(3, 4);
        bytes[512..520].copy_from_slice(b"notvalid");

        let image = classify_bytes(bytes, &VaultConfig::default());
        assert!(image.footer().is_some());
        assert!(image.header().is_none());
        assert!(!image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::Unrecognized);
    }

    #[test]
    fn test_header_presence_is_enough_by_default() {
        // Footer claims disk type 0 but a sparse header is present
        let image = classify_bytes(dynamic_image(0, 4), &VaultConfig::default());
        assert!(image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::Dynamic);
    }

    #[test]
    fn test_strict_mode_requires_sparse_disk_type() {
        let strict = VaultConfig {
            strict_dynamic: true,
        };
        let image = classify_bytes(dynamic_image(0, 4), &strict);
        assert!(!image.is_dynamic());
        assert_eq!(image.variant(), DiskVariant::Unrecognized);

        let image = classify_bytes(dynamic_image(3, 4), &strict);
        assert!(image.is_dynamic());
    }

    #[test]
    fn test_classify_from_file() {
        let mut tmpfile = NamedTempFile::new().unwrap();
        tmpfile.write_all(&fixed_image(1024)).unwrap();
        tmpfile.flush().unwrap();

        let mut file = std::fs::File::open(tmpfile.path()).unwrap();
        let image = VhdImage::classify(&mut file, &VaultConfig::default()).unwrap();
        assert!(image.is_fixed());
        assert_eq!(image.file_len(), 1024 + 512);
    }

    #[test]
    fn test_bat_entries_from_classified_image() {
        let mut cursor = Cursor::new(dynamic_image(3, 6));
        let image = VhdImage::classify(&mut cursor, &VaultConfig::default()).unwrap();

        let entries = image.bat().unwrap().read_entries(&mut cursor).unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(types::BlockAllocationTable::allocated_count(&entries), 3);
    }

    #[test]
    fn test_summary_serializes() {
        let image = classify_bytes(dynamic_image(3, 2), &VaultConfig::default());
        let summary = image.summary();
        assert_eq!(summary.variant, DiskVariant::Dynamic);
        assert_eq!(summary.header.as_ref().unwrap().bat_byte_size, 8);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["variant"], "Dynamic");
        assert_eq!(json["footer"]["disk_type"], "Dynamic");
        assert_eq!(json["header"]["max_table_entries"], 2);
    }
}
