//! Allocation limits and checked arithmetic
//!
//! Sizes read from an image are untrusted. Anything that turns an on-disk
//! count into a buffer length or a file offset goes through these helpers.

use crate::Error;

/// Maximum BAT span we'll materialize in memory (64 MB, 16M entries)
pub const MAX_BAT_BYTES: u64 = 64 * 1024 * 1024;

/// Validate that a size is within allocation limits
///
/// # Security
/// Prevents memory exhaustion from a forged `max_table_entries`
pub fn validate_allocation_size(size: u64, limit: u64, context: &str) -> crate::Result<usize> {
    if size > limit {
        return Err(Error::AllocationLimit(format!(
            "{} size {} exceeds limit {}",
            context, size, limit
        )));
    }

    size.try_into()
        .map_err(|_| Error::AllocationLimit(format!("{} size exceeds platform limits", context)))
}

/// Safely add two offsets with overflow checking
pub fn checked_add_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| Error::AllocationLimit(format!("{}: offset overflow", context)))
}
