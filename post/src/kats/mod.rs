/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains exports for the Cryptolith Known Answer Tests.

--*/

mod aes_cbc_kat;
mod aes_ecb_kat;
mod hmac_kat;
mod indicator_kat;
mod sha256_kat;

pub use aes_cbc_kat::AesCbcKat;
pub use aes_ecb_kat::AesEcbKat;
pub use hmac_kat::HmacKat;
pub use indicator_kat::IndicatorKat;
pub use sha256_kat::Sha256Kat;

use cryptolith_common::PostMode;

/// Flip the low bit of the first expected byte when the force-fail flag for
/// this build target is set, so every comparison below is proven able to
/// fail.
pub(crate) fn corrupt_if_forced<const N: usize>(mode: PostMode, mut expected: [u8; N]) -> [u8; N] {
    if mode.force_fail() {
        expected[0] ^= 0x01;
    }
    expected
}
