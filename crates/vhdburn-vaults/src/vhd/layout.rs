//! Byte layout of the VHD 1.0 structures
//!
//! Offsets are relative to the start of their structure. They are written out
//! literally rather than accumulated from field sizes.

/// Hard disk footer (512 bytes, last sector of every image)
pub mod footer {
    pub const COOKIE: usize = 0;
    pub const FEATURES: usize = 8;
    pub const FILE_FORMAT_VERSION: usize = 12;
    pub const DATA_OFFSET: usize = 16;
    pub const TIME_STAMP: usize = 24;
    pub const CREATOR_APPLICATION: usize = 28;
    pub const CREATOR_VERSION: usize = 32;
    pub const CREATOR_HOST_OS: usize = 36;
    pub const ORIGINAL_SIZE: usize = 40;
    pub const CURRENT_SIZE: usize = 48;
    pub const DISK_GEOMETRY: usize = 56;
    pub const DISK_TYPE: usize = 60;
    pub const CHECKSUM: usize = 64;
    pub const UNIQUE_ID: usize = 68;
    pub const SAVED_STATE: usize = 84;
    pub const RESERVED: usize = 85;

    pub const SIZE: usize = 512;
}

/// Dynamic disk header (1024 bytes at absolute offset 512)
pub mod header {
    pub const COOKIE: usize = 0;
    pub const DATA_OFFSET: usize = 8;
    pub const TABLE_OFFSET: usize = 16;
    pub const HEADER_VERSION: usize = 24;
    pub const MAX_TABLE_ENTRIES: usize = 28;
    pub const BLOCK_SIZE: usize = 32;
    pub const CHECKSUM: usize = 36;
    pub const PARENT_UNIQUE_ID: usize = 40;
    pub const PARENT_TIME_STAMP: usize = 56;
    pub const RESERVED1: usize = 60;
    pub const PARENT_UNICODE_NAME: usize = 64;
    pub const PARENT_LOCATOR_ENTRIES: usize = 576;
    pub const RESERVED2: usize = 768;

    pub const PARENT_UNICODE_NAME_LEN: usize = 512;
    pub const PARENT_LOCATOR_ENTRY_LEN: usize = 24;
    pub const PARENT_LOCATOR_COUNT: usize = 8;

    pub const SIZE: usize = 1024;
}

/// Absolute file positions of the leading structures of a dynamic image
pub mod file {
    /// Copy of the footer at the start of dynamic images
    pub const FOOTER_COPY_OFFSET: u64 = 0;
    pub const HEADER_OFFSET: u64 = 512;
    /// Where the BAT conventionally begins (footer copy + header)
    pub const BAT_OFFSET: u64 = 512 + 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_fields_fill_structure() {
        assert_eq!(footer::RESERVED + 427, footer::SIZE);
        assert_eq!(footer::UNIQUE_ID + 16, footer::SAVED_STATE);
    }

    #[test]
    fn test_header_fields_fill_structure() {
        assert_eq!(
            header::PARENT_UNICODE_NAME + header::PARENT_UNICODE_NAME_LEN,
            header::PARENT_LOCATOR_ENTRIES
        );
        assert_eq!(
            header::PARENT_LOCATOR_ENTRIES
                + header::PARENT_LOCATOR_COUNT * header::PARENT_LOCATOR_ENTRY_LEN,
            header::RESERVED2
        );
        assert_eq!(header::RESERVED2 + 256, header::SIZE);
    }

    #[test]
    fn test_bat_follows_header() {
        assert_eq!(file::HEADER_OFFSET as usize, footer::SIZE);
        assert_eq!(file::BAT_OFFSET, file::HEADER_OFFSET + header::SIZE as u64);
    }
}
