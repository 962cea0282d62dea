//! # vhdburn Vaults
//!
//! Container format handling for Microsoft VHD 1.0 images.
//!
//! - [`field`]: big-endian field extraction
//! - [`vhd::types`]: hard disk footer, dynamic disk header, BAT span
//! - [`vhd::VhdImage`]: fixed / dynamic / unrecognized classification
//!
//! ## Example
//!
//! ```rust,no_run
//! use vhdburn_vaults::{VaultConfig, VhdImage};
//! use std::fs::File;
//!
//! let mut file = File::open("disk.vhd").unwrap();
//! let image = VhdImage::classify(&mut file, &VaultConfig::default()).unwrap();
//!
//! println!("Type: {}", image.variant());
//! println!("Fixed: {}", image.is_fixed());
//! ```

pub mod config;
pub mod field;
pub mod vhd;

pub use config::VaultConfig;
pub use field::read_uint;
pub use vhd::types::{BlockAllocationTable, DiskGeometry, DiskType, DynamicDiskHeader, HardDiskFooter};
pub use vhd::{FooterSummary, HeaderSummary, ImageSummary, VhdImage};
