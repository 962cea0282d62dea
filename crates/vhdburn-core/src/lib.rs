//! # vhdburn Core
//!
//! Core traits, types, and error handling shared by the vhdburn crates.
//!
//! - **Vaults** (`vhdburn-vaults`): decoding and classifying VHD containers
//! - **Zones** (`vhdburn-zones`): building and burning the MBR boot sector
//!
//! ## Example
//!
//! ```rust
//! use vhdburn_core::{ConfirmationPolicy, DiskVariant};
//!
//! let mut force = |_: &str| true;
//! assert!(force.confirm("Overwrite boot sector?"));
//! assert!(DiskVariant::Fixed.is_recognized());
//! ```

pub mod error;
pub mod security;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use security::*;
pub use traits::{ConfirmationPolicy, ReadSeek, ReadWriteSeek};
pub use types::{format_size, DiskVariant};
