/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains types shared by the Cryptolith POST subsystem: the POST
    mode bitmask, the platform flags word, and the compiled-in
    expected-integrity storage.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

use bitflags::bitflags;

bitflags! {
    /// POST behavioral overrides.
    ///
    /// The bit positions are part of the external contract; callers hand the
    /// raw word across the module boundary. Bits 0, 1 and 3 are obsolete and
    /// accepted but ignored.
    pub struct PostMode: u32 {
        /// Obsolete debug flag
        const DEBUG = 1 << 0;

        /// Obsolete verbose flag
        const VERBOSE = 1 << 1;

        /// Skip everything and report success
        const DISABLE = 1 << 2;

        /// Corrupt expected values to prove failure detection (user target)
        const FORCE_FAIL_USER = 1 << 4;

        /// Corrupt expected values to prove failure detection (kernel target)
        const FORCE_FAIL_KERNEL = 1 << 5;

        /// Skip the module integrity check only
        const NO_INTEGRITY = 1 << 6;

        /// Enable trace recording
        const TRACE = 1 << 7;

        /// Convert a fatal aggregate into a reportable success
        const NO_PANIC = 1 << 8;
    }
}

impl PostMode {
    /// Parse a caller-supplied word, dropping unknown and obsolete bits.
    pub fn from_raw(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }

    pub fn is_disabled(self) -> bool {
        self.contains(Self::DISABLE)
    }

    pub fn is_trace(self) -> bool {
        self.contains(Self::TRACE)
    }

    pub fn is_no_integrity(self) -> bool {
        self.contains(Self::NO_INTEGRITY)
    }

    pub fn is_no_panic(self) -> bool {
        self.contains(Self::NO_PANIC)
    }

    /// True when the force-fail flag for this build target is set.
    ///
    /// The target is selected at compile time; the other target's flag is
    /// never honored from untrusted input.
    pub fn force_fail(self) -> bool {
        #[cfg(feature = "kernel")]
        {
            self.contains(Self::FORCE_FAIL_KERNEL)
        }
        #[cfg(not(feature = "kernel"))]
        {
            self.contains(Self::FORCE_FAIL_USER)
        }
    }
}

/// Platform flags recorded in the trace header.
pub const SYSFLAG_IOS: u64 = 1 << 0;
pub const SYSFLAG_MACOS: u64 = 1 << 1;
pub const SYSFLAG_SEP: u64 = 1 << 2;
pub const SYSFLAG_KERNEL: u64 = 1 << 3;

/// Flags word describing the binary this subsystem was compiled into.
pub fn platform_flags() -> u64 {
    let mut flags = 0;
    if cfg!(target_os = "macos") {
        flags |= SYSFLAG_MACOS;
    }
    if cfg!(target_os = "ios") {
        flags |= SYSFLAG_IOS;
    }
    if cfg!(feature = "kernel") {
        flags |= SYSFLAG_KERNEL;
    }
    flags
}

/// Size of the expected-integrity MAC.
pub const INTEGRITY_MAC_SIZE: usize = 32;

/// Marker locating the expected-integrity MAC inside the linked binary.
pub const PRECALC_MAC_MARKER: [u8; 16] = *b"CRYPTOLITH-MAC-1";

/// Storage for the precomputed code-section MAC.
#[repr(C)]
pub struct PrecalcMac {
    pub marker: [u8; 16],
    pub mac: [u8; INTEGRITY_MAC_SIZE],
}

/// The precomputed MAC is placed here for integrity testing. The value
/// compiled in is a random number; the integrity tool replaces it in the
/// final linked binary. The runtime only ever reads it.
#[no_mangle]
#[used]
pub static CRYPTOLITH_PRECALC_MAC: PrecalcMac = PrecalcMac {
    marker: PRECALC_MAC_MARKER,
    mac: [
        0x3c, 0x9f, 0x1a, 0xd4, 0x5b, 0x07, 0xe8, 0x62, 0x91, 0x2f, 0xc3, 0x78, 0x0d, 0xa6, 0x54,
        0xb9, 0x17, 0xee, 0x40, 0x8a, 0x25, 0xdc, 0x6e, 0x03, 0xf1, 0x3b, 0x96, 0x48, 0xcd, 0x72,
        0x0f, 0xe5,
    ],
};

/// Expected code-section MAC for the currently-executing module.
pub fn expected_integrity_mac() -> &'static [u8; INTEGRITY_MAC_SIZE] {
    &CRYPTOLITH_PRECALC_MAC.mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bit_positions() {
        assert_eq!(PostMode::DISABLE.bits(), 0x04);
        assert_eq!(PostMode::FORCE_FAIL_USER.bits(), 0x10);
        assert_eq!(PostMode::FORCE_FAIL_KERNEL.bits(), 0x20);
        assert_eq!(PostMode::NO_INTEGRITY.bits(), 0x40);
        assert_eq!(PostMode::TRACE.bits(), 0x80);
        assert_eq!(PostMode::NO_PANIC.bits(), 0x100);
    }

    #[test]
    fn test_from_raw_ignores_unknown_bits() {
        // Bit 3 is obsolete and bits above 8 were never assigned.
        let mode = PostMode::from_raw(0x8 | 0x200 | 0x84);
        assert_eq!(mode, PostMode::DISABLE | PostMode::TRACE);
    }

    #[cfg(not(feature = "kernel"))]
    #[test]
    fn test_force_fail_selects_user_flag() {
        assert!(PostMode::from_raw(0x10).force_fail());
        assert!(!PostMode::from_raw(0x20).force_fail());
    }

    #[cfg(feature = "kernel")]
    #[test]
    fn test_force_fail_selects_kernel_flag() {
        assert!(PostMode::from_raw(0x20).force_fail());
        assert!(!PostMode::from_raw(0x10).force_fail());
    }
}
