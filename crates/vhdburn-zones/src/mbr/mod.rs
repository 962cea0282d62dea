//! MBR boot sector burning
//!
//! Writes a caller-supplied boot sector into a VHD image.
//!
//! # Target offsets
//!
//! ```text
//! Fixed:    0
//! Dynamic:  512 (footer copy) + 1024 (header) + BAT bytes,
//!           followed by a rewrite of the footer at target + 512
//! ```
//!
//! Nothing here asks for confirmation. Callers pass the decision in as a
//! `proceed` flag, or hand [`BootSectorWriter::burn_image`] a
//! [`ConfirmationPolicy`] to consult once the payload has been validated.
//!
//! A fixed image needs at least one data sector ahead of its footer. A bare
//! 512-byte image is refused since sector 0 would be the footer itself.
//!
//! Classification and writing are separate steps over the same handle. The
//! image is assumed not to change in between; nothing here locks the file.

pub mod types;

use std::io::{Seek, SeekFrom, Write};
use types::{BootSector, BurnOutcome, BurnReport};
use vhdburn_core::{checked_add_u64, ConfirmationPolicy, Error, ReadWriteSeek, Result};
use vhdburn_vaults::vhd::layout::file as layout;
use vhdburn_vaults::{HardDiskFooter, VhdImage};

/// Boot sector writer
///
/// Validation always runs before any I/O. A declined request touches nothing
/// and reports [`BurnOutcome::WriteSkipped`]. Every write is flushed; an
/// interrupted write is not rolled back.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootSectorWriter;

impl BootSectorWriter {
    /// Target offset for fixed images
    pub const FIXED_TARGET_OFFSET: u64 = 0;

    /// Start of the data region of a dynamic image, before the BAT span
    pub const DYNAMIC_DATA_BASE: u64 = layout::BAT_OFFSET;

    /// Smallest fixed image with a data sector ahead of the footer
    pub const MIN_FIXED_IMAGE_LEN: u64 = (BootSector::SIZE + HardDiskFooter::SIZE) as u64;

    /// Burn `payload` into sector 0 of a fixed image
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] for 511 bytes or more than 512 (nothing written)
    /// - [`Error::Truncated`] if the image has no data sector before its footer
    /// - [`Error::Io`] if the seek, write or flush fails
    pub fn burn_fixed<W: Write + Seek + ?Sized>(
        file: &mut W,
        payload: &[u8],
        proceed: bool,
    ) -> Result<BurnOutcome> {
        let sector = BootSector::build(payload)?;
        Self::write_fixed(file, &sector, proceed)
    }

    /// Burn `payload` after the BAT of a dynamic image
    ///
    /// The trailing footer is read before anything is written and copied to
    /// the sector after the new boot sector.
    pub fn burn_dynamic(
        file: &mut dyn ReadWriteSeek,
        payload: &[u8],
        bat_byte_size: u64,
        proceed: bool,
    ) -> Result<BurnOutcome> {
        let sector = BootSector::build(payload)?;
        let offset = checked_add_u64(Self::DYNAMIC_DATA_BASE, bat_byte_size, "boot sector target")?;
        let footer_copy_offset = checked_add_u64(offset, BootSector::SIZE as u64, "footer copy")?;

        if !proceed {
            tracing::info!("Boot sector write declined, image left untouched");
            return Ok(BurnOutcome::WriteSkipped);
        }

        let footer = HardDiskFooter::decode(&mut *file)?;

        write_sector(file, offset, sector.bytes())?;
        write_sector(file, footer_copy_offset, footer.raw())?;
        tracing::info!(
            offset,
            footer_copy_offset,
            payload_len = sector.payload_len(),
            "Burned boot sector into dynamic image"
        );

        Ok(BurnOutcome::Written(BurnReport {
            offset,
            payload_len: sector.payload_len(),
            footer_copy_offset: Some(footer_copy_offset),
            warnings: sector.warnings().to_vec(),
        }))
    }

    /// Burn `payload` into a classified image, asking `policy` first.
    ///
    /// Order of checks: payload size, then fixed-disk classification, then the
    /// confirmation policy. The policy is never consulted for a request that
    /// would be refused anyway.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] for 511 bytes or more than 512
    /// - [`Error::NotFixedDiskImage`] unless `image` classified as fixed
    /// - [`Error::Truncated`] if the image has no data sector before its footer
    /// - [`Error::Io`] if the write fails
    pub fn burn_image(
        file: &mut dyn ReadWriteSeek,
        image: &VhdImage,
        payload: &[u8],
        policy: &mut dyn ConfirmationPolicy,
    ) -> Result<BurnOutcome> {
        let sector = BootSector::build(payload)?;

        if !image.is_fixed() {
            return Err(Error::not_fixed_disk(format!(
                "image classified as {}",
                image.variant()
            )));
        }
        check_fixed_len(image.file_len())?;

        let proceed = policy.confirm(&format!(
            "Overwrite the boot sector with {} bytes?",
            sector.payload_len()
        ));

        Self::write_fixed(file, &sector, proceed)
    }

    fn write_fixed<W: Write + Seek + ?Sized>(
        file: &mut W,
        sector: &BootSector,
        proceed: bool,
    ) -> Result<BurnOutcome> {
        if !proceed {
            tracing::info!("Boot sector write declined, image left untouched");
            return Ok(BurnOutcome::WriteSkipped);
        }

        check_fixed_len(file.seek(SeekFrom::End(0))?)?;
        write_sector(file, Self::FIXED_TARGET_OFFSET, sector.bytes())?;
        tracing::info!(
            payload_len = sector.payload_len(),
            "Burned boot sector into fixed image"
        );

        Ok(BurnOutcome::Written(BurnReport {
            offset: Self::FIXED_TARGET_OFFSET,
            payload_len: sector.payload_len(),
            footer_copy_offset: None,
            warnings: sector.warnings().to_vec(),
        }))
    }
}

fn check_fixed_len(file_len: u64) -> Result<()> {
    if file_len < BootSectorWriter::MIN_FIXED_IMAGE_LEN {
        return Err(Error::truncated(format!(
            "{} byte image has no data sector ahead of its footer",
            file_len
        )));
    }
    Ok(())
}

fn write_sector<W: Write + Seek + ?Sized>(file: &mut W, offset: u64, bytes: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}
