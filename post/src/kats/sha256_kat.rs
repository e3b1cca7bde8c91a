/*++

Licensed under the Apache-2.0 license.

File Name:

    sha256_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for SHA-256.

--*/

use cryptolith_error::{CryptolithError, CryptolithResult};
use sha2::{Digest, Sha256};

use crate::kats::corrupt_if_forced;
use crate::PostEnv;

#[derive(Default, Debug)]
pub struct Sha256Kat {}

impl Sha256Kat {
    /// Executes the SHA-256 KATs.
    ///
    /// Test vector source: FIPS 180-4 examples (empty message and "abc").
    pub fn execute(&self, env: &PostEnv) -> CryptolithResult<()> {
        self.kat_no_data(env)?;
        self.kat_abc(env)?;
        Ok(())
    }

    fn kat_no_data(&self, env: &PostEnv) -> CryptolithResult<()> {
        const EXPECTED: [u8; 32] = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        self.check(env, &[], EXPECTED)
    }

    fn kat_abc(&self, env: &PostEnv) -> CryptolithResult<()> {
        const EXPECTED: [u8; 32] = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        self.check(env, b"abc", EXPECTED)
    }

    fn check(&self, env: &PostEnv, msg: &[u8], expected: [u8; 32]) -> CryptolithResult<()> {
        let expected = corrupt_if_forced(env.mode, expected);
        let digest = Sha256::digest(msg);
        if digest.as_slice() != expected.as_slice() {
            return Err(CryptolithError::KAT_SHA256_MISMATCH);
        }
        Ok(())
    }
}
