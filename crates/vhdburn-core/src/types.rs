//! Core types for vhdburn

use serde::Serialize;
use std::fmt;

/// Classification of an image, computed once when it is inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiskVariant {
    /// No verified footer, or a footer describing neither variant
    Unrecognized,
    /// Fixed VHD: data offset sentinel plus disk type 2
    Fixed,
    /// Sparse header present
    Dynamic,
    /// Sparse header present and the footer says differencing
    DifferencingDisk,
}

impl DiskVariant {
    /// Human-readable name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unrecognized => "Unrecognized",
            Self::Fixed => "Microsoft VHD (Fixed)",
            Self::Dynamic => "Microsoft VHD (Dynamic)",
            Self::DifferencingDisk => "Microsoft VHD (Differencing)",
        }
    }

    /// True for any variant backed by a verified VHD structure
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

impl fmt::Display for DiskVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Format size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
