/*++

Licensed under the Apache-2.0 license.

File Name:

    hmac_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for HMAC-SHA-256, the
    mechanism the module integrity digest is built on.

--*/

use cryptolith_error::{CryptolithError, CryptolithResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::kats::corrupt_if_forced;
use crate::PostEnv;

#[derive(Default, Debug)]
pub struct HmacKat {}

impl HmacKat {
    /// Executes the HMAC-SHA-256 KATs.
    ///
    /// Test vector source: RFC 4231, test cases 1 and 2.
    pub fn execute(&self, env: &PostEnv) -> CryptolithResult<()> {
        self.kat_rfc4231_case_1(env)?;
        self.kat_rfc4231_case_2(env)?;
        Ok(())
    }

    fn kat_rfc4231_case_1(&self, env: &PostEnv) -> CryptolithResult<()> {
        const EXPECTED: [u8; 32] = [
            0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b,
            0xf1, 0x2b, 0x88, 0x1d, 0xc2, 0x00, 0xc9, 0x83, 0x3d, 0xa7, 0x26, 0xe9, 0x37, 0x6c,
            0x2e, 0x32, 0xcf, 0xf7,
        ];
        self.check(env, &[0x0b; 20], b"Hi There", EXPECTED)
    }

    fn kat_rfc4231_case_2(&self, env: &PostEnv) -> CryptolithResult<()> {
        const EXPECTED: [u8; 32] = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        self.check(env, b"Jefe", b"what do ya want for nothing?", EXPECTED)
    }

    fn check(
        &self,
        env: &PostEnv,
        key: &[u8],
        msg: &[u8],
        expected: [u8; 32],
    ) -> CryptolithResult<()> {
        let expected = corrupt_if_forced(env.mode, expected);
        let mut mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|_| CryptolithError::KAT_HMAC_MISMATCH)?;
        mac.update(msg);
        if mac.finalize().into_bytes().as_slice() != expected.as_slice() {
            return Err(CryptolithError::KAT_HMAC_MISMATCH);
        }
        Ok(())
    }
}
