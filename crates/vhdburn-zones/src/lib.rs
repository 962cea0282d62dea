//! # vhdburn Zones
//!
//! Boot sector handling for VHD images.
//!
//! - [`mbr::types::BootSector`]: builds a signed 512-byte sector from a payload
//! - [`mbr::BootSectorWriter`]: burns that sector into fixed or dynamic images
//!
//! ## Example
//!
//! ```rust,no_run
//! use vhdburn_vaults::{VaultConfig, VhdImage};
//! use vhdburn_zones::BootSectorWriter;
//! use std::fs::OpenOptions;
//!
//! let mut file = OpenOptions::new().read(true).write(true).open("disk.vhd").unwrap();
//! let image = VhdImage::classify(&mut file, &VaultConfig::default()).unwrap();
//!
//! let payload = std::fs::read("boot.bin").unwrap();
//! let mut force = |_: &str| true;
//! let outcome = BootSectorWriter::burn_image(&mut file, &image, &payload, &mut force).unwrap();
//! println!("Written: {}", outcome.is_written());
//! ```

pub mod mbr;

pub use mbr::types::{BootSector, BurnOutcome, BurnReport, BurnWarning};
pub use mbr::BootSectorWriter;
