/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the module integrity check: locate the code section of a
    Mach-O image and verify its keyed digest against the compiled-in value.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(test, feature = "test-images"))]
extern crate alloc;

use cryptolith_common::PostMode;
use cryptolith_error::{CryptolithError, CryptolithResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

#[cfg(any(test, feature = "test-images"))]
pub mod fake;
pub mod macho;

/// Key for the code-section digest. A fixed public key; the digest binds
/// content, not a secret.
pub const INTEGRITY_MAC_KEY: [u8; 1] = [0u8];

fn code_mac(image: &[u8], max_offset: usize) -> CryptolithResult<Hmac<Sha256>> {
    let range = macho::find_code_section(image, max_offset)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&INTEGRITY_MAC_KEY)
        .map_err(|_| CryptolithError::INTEGRITY_MAC_INIT_FAILURE)?;
    mac.update(&image[range]);
    Ok(mac)
}

/// Compute the keyed digest of the image's code section.
pub fn compute_code_mac(image: &[u8], max_offset: usize) -> CryptolithResult<[u8; 32]> {
    Ok(code_mac(image, max_offset)?.finalize().into_bytes().into())
}

/// Verify the image's code-section digest against `expected`.
///
/// When the mode carries the force-fail flag for this build target, one bit
/// of a copy of `expected` is flipped first so the mismatch path is proven.
pub fn check_integrity(
    mode: PostMode,
    image: &[u8],
    max_offset: usize,
    expected: &[u8; 32],
) -> CryptolithResult<()> {
    let mut expected = *expected;
    if mode.force_fail() {
        expected[0] ^= 0x01;
    }
    code_mac(image, max_offset)?
        .verify_slice(&expected)
        .map_err(|_| CryptolithError::INTEGRITY_MAC_MISMATCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{pad16, FakeImage};
    use crate::macho::{find_code_section, MachHeader64, SegmentCommand64};
    use core::mem::size_of;
    use zerocopy::{FromBytes, IntoBytes};

    const CODE: &[u8] = b"\x55\x48\x89\xe5\x31\xc0\x5d\xc3";

    fn direct_mac(data: &[u8]) -> [u8; 32] {
        let mut mac = Hmac::<Sha256>::new_from_slice(&INTEGRITY_MAC_KEY).unwrap();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    #[test]
    fn test_find_code_section_64() {
        let image = FakeImage::default().build(CODE);
        let range = find_code_section(&image, 0).unwrap();
        assert_eq!(&image[range], CODE);
    }

    #[test]
    fn test_find_code_section_32() {
        let image = FakeImage {
            bits64: false,
            ..Default::default()
        }
        .build(CODE);
        let range = find_code_section(&image, 0).unwrap();
        assert_eq!(&image[range], CODE);
    }

    #[test]
    fn test_find_code_section_text_exec() {
        let image = FakeImage {
            exec_segment: true,
            ..Default::default()
        }
        .build(CODE);
        let range = find_code_section(&image, 0).unwrap();
        assert_eq!(&image[range], CODE);
    }

    #[test]
    fn test_in_cache_image_rebases_section_address() {
        let image = FakeImage {
            in_cache: true,
            ..Default::default()
        }
        .build(CODE);
        assert_eq!(compute_code_mac(&image, 0).unwrap(), direct_mac(CODE));
    }

    #[test]
    fn test_mac_is_deterministic_and_covers_only_code() {
        let plain = FakeImage::default().build(CODE);
        let cached = FakeImage {
            in_cache: true,
            ..Default::default()
        }
        .build(CODE);
        let mac = compute_code_mac(&plain, 0).unwrap();
        assert_eq!(mac, compute_code_mac(&plain, 0).unwrap());
        // Header bytes differ between the two layouts but the code does not.
        assert_eq!(mac, compute_code_mac(&cached, 0).unwrap());
        assert_eq!(mac, direct_mac(CODE));
    }

    #[test]
    fn test_code_byte_flip_changes_mac() {
        let mut image = FakeImage::default().build(CODE);
        let baseline = compute_code_mac(&image, 0).unwrap();
        let code_off = image.len() - CODE.len();
        image[code_off] ^= 0x01;
        assert_ne!(baseline, compute_code_mac(&image, 0).unwrap());
    }

    #[test]
    fn test_check_integrity_matches() {
        let image = FakeImage::default().build(CODE);
        let expected = compute_code_mac(&image, 0).unwrap();
        assert_eq!(
            Ok(()),
            check_integrity(PostMode::empty(), &image, 0, &expected)
        );
    }

    #[test]
    fn test_check_integrity_detects_mismatch() {
        let image = FakeImage::default().build(CODE);
        let mut expected = compute_code_mac(&image, 0).unwrap();
        expected[31] ^= 0x80;
        assert_eq!(
            Err(CryptolithError::INTEGRITY_MAC_MISMATCH),
            check_integrity(PostMode::empty(), &image, 0, &expected)
        );
    }

    #[cfg(not(feature = "kernel"))]
    #[test]
    fn test_check_integrity_force_fail() {
        let image = FakeImage::default().build(CODE);
        let expected = compute_code_mac(&image, 0).unwrap();
        assert_eq!(
            Err(CryptolithError::INTEGRITY_MAC_MISMATCH),
            check_integrity(PostMode::FORCE_FAIL_USER, &image, 0, &expected)
        );
        // The other target's flag is ignored.
        assert_eq!(
            Ok(()),
            check_integrity(PostMode::FORCE_FAIL_KERNEL, &image, 0, &expected)
        );
    }

    // Force-fail flips exactly the low bit of the first expected byte, so a
    // pre-flipped value verifies and the computed digest itself is untouched.
    #[cfg(not(feature = "kernel"))]
    #[test]
    fn test_force_fail_flips_one_expected_bit() {
        let image = FakeImage::default().build(CODE);
        let mut flipped = compute_code_mac(&image, 0).unwrap();
        flipped[0] ^= 0x01;
        assert_eq!(
            Ok(()),
            check_integrity(PostMode::FORCE_FAIL_USER, &image, 0, &flipped)
        );
        assert_eq!(compute_code_mac(&image, 0).unwrap(), direct_mac(CODE));
    }

    #[test]
    fn test_unsupported_magic() {
        let mut image = FakeImage::default().build(CODE);
        image[0] = 0x7f;
        assert_eq!(
            Err(CryptolithError::INTEGRITY_UNSUPPORTED_IMAGE),
            find_code_section(&image, 0).map(drop)
        );
    }

    #[test]
    fn test_image_too_small() {
        let image = FakeImage::default().build(CODE);
        assert_eq!(
            Err(CryptolithError::INTEGRITY_IMAGE_TOO_SMALL),
            find_code_section(&image[..16], 0).map(drop)
        );
    }

    #[test]
    fn test_no_code_section() {
        let image = FakeImage {
            sectname: pad16(b"__const"),
            ..Default::default()
        }
        .build(CODE);
        assert_eq!(
            Err(CryptolithError::INTEGRITY_CODE_SECTION_NOT_FOUND),
            find_code_section(&image, 0).map(drop)
        );
    }

    #[test]
    fn test_max_offset_excludes_code() {
        let image = FakeImage::default().build(CODE);
        // Bound the region so the load commands parse but the code section
        // falls outside it.
        let bound = image.len() - CODE.len();
        assert_eq!(
            Err(CryptolithError::INTEGRITY_BOUNDS_VIOLATION),
            find_code_section(&image, bound).map(drop)
        );
    }

    #[test]
    fn test_max_offset_at_image_end_is_accepted() {
        let image = FakeImage::default().build(CODE);
        let range = find_code_section(&image, image.len()).unwrap();
        assert_eq!(&image[range], CODE);
    }

    #[test]
    fn test_zero_cmdsize_is_rejected() {
        let mut image = FakeImage::default().build(CODE);
        // cmdsize lives right after cmd at the start of the first command.
        let cmdsize_off = size_of::<MachHeader64>() + 4;
        image[cmdsize_off..cmdsize_off + 4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            Err(CryptolithError::INTEGRITY_MALFORMED_COMMAND),
            find_code_section(&image, 0).map(drop)
        );
    }

    #[test]
    fn test_command_past_region_is_rejected() {
        let mut image = FakeImage::default().build(CODE);
        let cmdsize_off = size_of::<MachHeader64>() + 4;
        let huge = (image.len() as u32 + 1).to_le_bytes();
        image[cmdsize_off..cmdsize_off + 4].copy_from_slice(&huge);
        assert_eq!(
            Err(CryptolithError::INTEGRITY_BOUNDS_VIOLATION),
            find_code_section(&image, 0).map(drop)
        );
    }

    #[test]
    fn test_non_segment_commands_are_skipped() {
        // Header claims two commands; the first is an unknown command that
        // must be stepped over to reach the segment.
        let base = FakeImage::default().build(CODE);
        let filler_len = 16usize;
        let (mut header, _) = MachHeader64::read_from_prefix(&base).unwrap();
        header.ncmds = 2;
        header.sizeofcmds += filler_len as u32;

        let mut image = Vec::new();
        image.extend_from_slice(header.as_bytes());
        image.extend_from_slice(&0x0000_0029u32.to_le_bytes()); // unknown cmd
        image.extend_from_slice(&(filler_len as u32).to_le_bytes());
        image.extend_from_slice(&[0u8; 8]);
        image.extend_from_slice(&base[size_of::<MachHeader64>()..]);

        // The code's file offset moved by the filler; patch the section's
        // addr and offset fields.
        let sect_off =
            size_of::<MachHeader64>() + filler_len + size_of::<SegmentCommand64>();
        let code_off = (base.len() - CODE.len() + filler_len) as u64;
        image[sect_off + 32..sect_off + 40].copy_from_slice(&code_off.to_le_bytes());
        image[sect_off + 48..sect_off + 52]
            .copy_from_slice(&(code_off as u32).to_le_bytes());

        let range = find_code_section(&image, 0).unwrap();
        assert_eq!(&image[range], CODE);
    }
}
