#![allow(clippy::cast_possible_truncation)]

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Smallest placement alignment a native heap honours for small textures.
pub const SMALL_ALIGNMENT: u64 = 4 * KIB;
/// Default placement alignment for buffers and most textures.
pub const DEFAULT_ALIGNMENT: u64 = 64 * KIB;
/// Placement alignment for multisampled textures.
pub const MSAA_ALIGNMENT: u64 = 4 * MIB;

/// Rounds `val` up to the next multiple of `align`, which must be a power of two.
#[must_use]
pub const fn align_up(val: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (val + align - 1) & !(align - 1)
}

/// Same as [`align_up`] but reports overflow instead of wrapping.
#[must_use]
pub const fn checked_align_up(val: u64, align: u64) -> Option<u64> {
    match val.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[must_use]
pub const fn is_aligned(val: u64, align: u64) -> bool {
    val & (align - 1) == 0
}

/// Human-readable byte count used in log lines and demos.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}
