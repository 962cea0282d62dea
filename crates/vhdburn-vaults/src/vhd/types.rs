//! VHD type definitions
//!
//! This module contains the parsed views over the raw VHD structures: the
//! hard disk footer, the dynamic disk header and the block allocation table.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vhdburn_core::{checked_add_u64, validate_allocation_size, Error, ReadSeek, Result, MAX_BAT_BYTES};

use super::layout::{file, footer, header};
use crate::field::{read_bytes, read_u32, read_u64};

/// VHD timestamps count seconds from 2000-01-01 00:00:00 UTC
const VHD_EPOCH_UNIX: i64 = 946_684_800;

/// VHD disk type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskType {
    None,
    Reserved1,
    Fixed,
    Dynamic,
    Differencing,
    Reserved5,
    Reserved6,
    /// Value outside the VHD 1.0 table
    Unknown(u32),
}

impl DiskType {
    /// Map the raw footer value onto the enumeration
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Reserved1,
            2 => Self::Fixed,
            3 => Self::Dynamic,
            4 => Self::Differencing,
            5 => Self::Reserved5,
            6 => Self::Reserved6,
            v => Self::Unknown(v),
        }
    }

    /// Raw footer value
    pub fn to_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Reserved1 => 1,
            Self::Fixed => 2,
            Self::Dynamic => 3,
            Self::Differencing => 4,
            Self::Reserved5 => 5,
            Self::Reserved6 => 6,
            Self::Unknown(v) => v,
        }
    }

    /// True for the two types that carry a sparse header
    pub fn is_sparse(self) -> bool {
        matches!(self, Self::Dynamic | Self::Differencing)
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Reserved1 | Self::Reserved5 | Self::Reserved6 => {
                write!(f, "Reserved ({})", self.to_u32())
            }
            Self::Fixed => write!(f, "Fixed"),
            Self::Dynamic => write!(f, "Dynamic"),
            Self::Differencing => write!(f, "Differencing"),
            Self::Unknown(v) => write!(f, "Unknown ({})", v),
        }
    }
}

/// Disk geometry (CHS addressing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    pub cylinders: u16,
    pub heads: u8,
    pub sectors: u8,
}

impl DiskGeometry {
    /// Parse disk geometry from the 4-byte footer field
    pub fn parse(bytes: [u8; 4]) -> Self {
        Self {
            cylinders: u16::from_be_bytes([bytes[0], bytes[1]]),
            heads: bytes[2],
            sectors: bytes[3],
        }
    }
}

impl fmt::Display for DiskGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cylinders, self.heads, self.sectors)
    }
}

/// Hard disk footer (512 bytes)
///
/// The footer is the last sector of every VHD. Dynamic and differencing
/// images keep a copy of it at offset 0 as well. A value of this type only
/// exists once the "conectix" cookie has been verified.
#[derive(Debug, Clone)]
pub struct HardDiskFooter {
    raw: [u8; footer::SIZE],
    features: u32,
    format_version: u32,
    data_offset: [u8; 8],
    timestamp: u32,
    creator_application: [u8; 4],
    creator_version: u32,
    creator_host_os: [u8; 4],
    original_size: u64,
    current_size: u64,
    geometry: DiskGeometry,
    disk_type: DiskType,
    checksum: u32,
    unique_id: [u8; 16],
    saved_state: u8,
}

impl HardDiskFooter {
    /// Footer cookie value "conectix"
    pub const COOKIE: &'static [u8; 8] = b"conectix";

    /// Size of the footer in bytes
    pub const SIZE: usize = footer::SIZE;

    /// Leading data offset bytes that mark a fixed disk
    pub const FIXED_DISK_TAG: [u8; 4] = [0xFF; 4];

    /// Read and verify the footer from the last 512 bytes of `file`
    pub fn decode<R: Read + Seek + ?Sized>(file: &mut R) -> Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;
        if file_len < Self::SIZE as u64 {
            return Err(Error::truncated(format!(
                "{} bytes is too small to hold a VHD footer",
                file_len
            )));
        }

        file.seek(SeekFrom::End(-(Self::SIZE as i64)))?;
        let mut bytes = [0u8; footer::SIZE];
        file.read_exact(&mut bytes)?;

        Self::parse(&bytes)
    }

    /// Parse a footer from raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::truncated("VHD footer too small"));
        }

        // Nothing else is trusted until the cookie matches
        let cookie: [u8; 8] = read_bytes(bytes, footer::COOKIE)?;
        if &cookie != Self::COOKIE {
            return Err(Error::invalid_footer_cookie(&cookie));
        }

        let raw: [u8; footer::SIZE] = read_bytes(bytes, 0)?;

        Ok(Self {
            features: read_u32(&raw, footer::FEATURES)?,
            format_version: read_u32(&raw, footer::FILE_FORMAT_VERSION)?,
            data_offset: read_bytes(&raw, footer::DATA_OFFSET)?,
            timestamp: read_u32(&raw, footer::TIME_STAMP)?,
            creator_application: read_bytes(&raw, footer::CREATOR_APPLICATION)?,
            creator_version: read_u32(&raw, footer::CREATOR_VERSION)?,
            creator_host_os: read_bytes(&raw, footer::CREATOR_HOST_OS)?,
            original_size: read_u64(&raw, footer::ORIGINAL_SIZE)?,
            current_size: read_u64(&raw, footer::CURRENT_SIZE)?,
            geometry: DiskGeometry::parse(read_bytes(&raw, footer::DISK_GEOMETRY)?),
            disk_type: DiskType::from_u32(read_u32(&raw, footer::DISK_TYPE)?),
            checksum: read_u32(&raw, footer::CHECKSUM)?,
            unique_id: read_bytes(&raw, footer::UNIQUE_ID)?,
            saved_state: raw[footer::SAVED_STATE],
            raw,
        })
    }

    /// The 512 bytes the footer was decoded from
    pub fn raw(&self) -> &[u8; footer::SIZE] {
        &self.raw
    }

    /// Feature bits (0x2 marks the reserved bit that is always set)
    pub fn features(&self) -> u32 {
        self.features
    }

    /// File format version, 0x00010000 for VHD 1.0
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Data offset as stored, for byte-wise sentinel comparison
    pub fn data_offset(&self) -> &[u8; 8] {
        &self.data_offset
    }

    /// Data offset read as a big-endian integer (display only)
    pub fn data_offset_value(&self) -> u64 {
        u64::from_be_bytes(self.data_offset)
    }

    /// True when the data offset starts with the all-ones fixed disk tag
    pub fn has_fixed_disk_tag(&self) -> bool {
        self.data_offset[..4] == Self::FIXED_DISK_TAG
    }

    /// Fixed disk: sentinel data offset AND disk type 2. Neither alone is enough.
    pub fn is_fixed_disk(&self) -> bool {
        self.has_fixed_disk_tag() && self.disk_type == DiskType::Fixed
    }

    /// Raw timestamp (seconds since 2000-01-01 UTC)
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Creation time as a UTC date
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        vhd_time(self.timestamp)
    }

    /// Four-character creator tag such as "vpc " or "qemu", trailing padding trimmed
    pub fn creator_application(&self) -> String {
        fourcc(&self.creator_application)
    }

    /// Creator version, major in the high 16 bits
    pub fn creator_version(&self) -> u32 {
        self.creator_version
    }

    /// Creator host OS tag ("Wi2k", "Mac ")
    pub fn creator_host_os(&self) -> String {
        fourcc(&self.creator_host_os)
    }

    /// Virtual disk size in bytes at creation
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Current virtual disk size in bytes
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// CHS geometry
    pub fn geometry(&self) -> DiskGeometry {
        self.geometry
    }

    /// Disk type as recorded in the footer
    pub fn disk_type(&self) -> DiskType {
        self.disk_type
    }

    /// Checksum as stored; never validated
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Identifier of this image
    pub fn unique_id(&self) -> Uuid {
        Uuid::from_bytes(self.unique_id)
    }

    /// Non-zero when the image is in a saved state
    pub fn saved_state(&self) -> u8 {
        self.saved_state
    }
}

/// Dynamic disk header (1024 bytes at offset 512)
///
/// Present in dynamic and differencing images only.
#[derive(Debug, Clone)]
pub struct DynamicDiskHeader {
    raw: [u8; header::SIZE],
    data_offset: u64,
    table_offset: u64,
    header_version: u32,
    max_table_entries: u32,
    block_size: u32,
    checksum: u32,
    parent_unique_id: [u8; 16],
    parent_timestamp: u32,
}

impl DynamicDiskHeader {
    /// Header cookie value "cxsparse"
    pub const COOKIE: &'static [u8; 8] = b"cxsparse";

    /// Size of the header in bytes
    pub const SIZE: usize = header::SIZE;

    /// Absolute file offset of the header
    pub const OFFSET: u64 = file::HEADER_OFFSET;

    /// Read and verify the header at offset 512.
    ///
    /// Taking the verified trailing footer makes it impossible to decode a
    /// header for an image whose footer failed. The footer copy at offset 0
    /// must carry the "conectix" cookie as well, and only then is the
    /// "cxsparse" cookie checked.
    pub fn decode<R: Read + Seek + ?Sized>(file: &mut R, footer: &HardDiskFooter) -> Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;
        if file_len < Self::OFFSET + Self::SIZE as u64 {
            return Err(Error::truncated(format!(
                "{} bytes is too small to hold a dynamic disk header",
                file_len
            )));
        }

        tracing::debug!(disk_type = %footer.disk_type(), "Decoding dynamic disk header");

        file.seek(SeekFrom::Start(file::FOOTER_COPY_OFFSET))?;
        let mut copy_cookie = [0u8; 8];
        file.read_exact(&mut copy_cookie)?;
        if &copy_cookie != HardDiskFooter::COOKIE {
            return Err(Error::invalid_footer_cookie(&copy_cookie));
        }

        file.seek(SeekFrom::Start(Self::OFFSET))?;
        let mut bytes = [0u8; header::SIZE];
        file.read_exact(&mut bytes)?;

        Self::parse(&bytes)
    }

    /// Parse a header from raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::truncated("VHD dynamic header too small"));
        }

        let cookie: [u8; 8] = read_bytes(bytes, header::COOKIE)?;
        if &cookie != Self::COOKIE {
            return Err(Error::invalid_header_cookie(&cookie));
        }

        let raw: [u8; header::SIZE] = read_bytes(bytes, 0)?;

        Ok(Self {
            data_offset: read_u64(&raw, header::DATA_OFFSET)?,
            table_offset: read_u64(&raw, header::TABLE_OFFSET)?,
            header_version: read_u32(&raw, header::HEADER_VERSION)?,
            max_table_entries: read_u32(&raw, header::MAX_TABLE_ENTRIES)?,
            block_size: read_u32(&raw, header::BLOCK_SIZE)?,
            checksum: read_u32(&raw, header::CHECKSUM)?,
            parent_unique_id: read_bytes(&raw, header::PARENT_UNIQUE_ID)?,
            parent_timestamp: read_u32(&raw, header::PARENT_TIME_STAMP)?,
            raw,
        })
    }

    /// The 1024 bytes the header was decoded from
    pub fn raw(&self) -> &[u8; header::SIZE] {
        &self.raw
    }

    /// Next structure offset, 0xFFFFFFFFFFFFFFFF when unused
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Absolute byte offset of the BAT
    pub fn table_offset(&self) -> u64 {
        self.table_offset
    }

    /// Header version, 0x00010000 for VHD 1.0
    pub fn header_version(&self) -> u32 {
        self.header_version
    }

    /// Number of BAT entries; equals the block count of the disk
    pub fn max_table_entries(&self) -> u32 {
        self.max_table_entries
    }

    /// Bytes of data per block, excluding the sector bitmap
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Checksum as stored; never validated
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Identifier of the parent image (differencing disks)
    pub fn parent_unique_id(&self) -> Uuid {
        Uuid::from_bytes(self.parent_unique_id)
    }

    /// Parent modification time, seconds since 2000-01-01 UTC
    pub fn parent_timestamp(&self) -> u32 {
        self.parent_timestamp
    }

    /// Parent file name (UTF-16BE), empty for dynamic disks
    pub fn parent_name(&self) -> String {
        let name = &self.raw[header::PARENT_UNICODE_NAME
            ..header::PARENT_UNICODE_NAME + header::PARENT_UNICODE_NAME_LEN];
        let units: Vec<u16> = name
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }

    /// The BAT described by this header
    pub fn bat(&self) -> BlockAllocationTable {
        BlockAllocationTable::new(self.table_offset, self.max_table_entries)
    }
}

/// Block Allocation Table span
///
/// Only the position and size are tracked. Entries are read on request so a
/// multi-million entry table is never loaded just to find what follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAllocationTable {
    table_offset: u64,
    entry_count: u32,
}

impl BlockAllocationTable {
    /// Size of one entry in bytes
    pub const ENTRY_SIZE: u64 = 4;

    /// Entry value of a block with no data in the file
    pub const UNALLOCATED: u32 = 0xFFFF_FFFF;

    pub fn new(table_offset: u64, entry_count: u32) -> Self {
        Self {
            table_offset,
            entry_count,
        }
    }

    /// Number of entries
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Absolute byte offset of the first entry
    pub fn table_offset(&self) -> u64 {
        self.table_offset
    }

    /// `entry_count * 4`
    pub fn byte_size(&self) -> u64 {
        self.entry_count as u64 * Self::ENTRY_SIZE
    }

    /// First byte past the table
    pub fn end_offset(&self) -> Result<u64> {
        checked_add_u64(self.table_offset, self.byte_size(), "BAT end")
    }

    /// Read every entry from `file`, bounded by [`MAX_BAT_BYTES`]
    pub fn read_entries(&self, file: &mut dyn ReadSeek) -> Result<Vec<u32>> {
        let len = validate_allocation_size(self.byte_size(), MAX_BAT_BYTES, "BAT")?;

        file.seek(SeekFrom::Start(self.table_offset))?;
        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;

        Ok(bytes
            .chunks_exact(Self::ENTRY_SIZE as usize)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Number of entries pointing at a data block
    pub fn allocated_count(entries: &[u32]) -> usize {
        entries.iter().filter(|&&e| e != Self::UNALLOCATED).count()
    }
}

/// A table sized from its entry count, at the conventional offset 1536
impl From<u32> for BlockAllocationTable {
    fn from(entry_count: u32) -> Self {
        Self::new(file::BAT_OFFSET, entry_count)
    }
}

fn vhd_time(seconds: u32) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(VHD_EPOCH_UNIX + seconds as i64, 0)
}

fn fourcc(bytes: &[u8; 4]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}
