/*++

Licensed under the Apache-2.0 license.

File Name:

    aes_ecb_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for AES-ECB single-block
    encryption and decryption.

--*/

use aes::cipher::consts::U16;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use aes::{Aes128, Aes256, Block};
use cryptolith_error::{CryptolithError, CryptolithResult};

use crate::kats::corrupt_if_forced;
use crate::PostEnv;

const PLAINTEXT: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];

const KEY_128: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

const CIPHERTEXT_128: [u8; 16] = [
    0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4, 0xc5,
    0x5a,
];

const KEY_256: [u8; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
    0x1e, 0x1f,
];

const CIPHERTEXT_256: [u8; 16] = [
    0x8e, 0xa2, 0xb7, 0xca, 0x51, 0x67, 0x45, 0xbf, 0xea, 0xfc, 0x49, 0x90, 0x4b, 0x49, 0x60,
    0x89,
];

#[derive(Default, Debug)]
pub struct AesEcbKat {}

impl AesEcbKat {
    /// Executes the AES-ECB KATs.
    ///
    /// Test vector source: FIPS 197 appendix C examples (AES-128, AES-256).
    pub fn execute(&self, env: &PostEnv) -> CryptolithResult<()> {
        self.kat_aes128(env)?;
        self.kat_aes256(env)?;
        Ok(())
    }

    fn kat_aes128(&self, env: &PostEnv) -> CryptolithResult<()> {
        let cipher = Aes128::new(&KEY_128.into());
        self.check(env, &cipher, CIPHERTEXT_128)
    }

    fn kat_aes256(&self, env: &PostEnv) -> CryptolithResult<()> {
        let cipher = Aes256::new(&KEY_256.into());
        self.check(env, &cipher, CIPHERTEXT_256)
    }

    fn check<C: BlockEncrypt + BlockDecrypt + BlockSizeUser<BlockSize = U16>>(
        &self,
        env: &PostEnv,
        cipher: &C,
        ciphertext: [u8; 16],
    ) -> CryptolithResult<()> {
        let mut block = Block::from(PLAINTEXT);
        cipher.encrypt_block(&mut block);
        let expected_ct = corrupt_if_forced(env.mode, ciphertext);
        if block.as_slice() != expected_ct.as_slice() {
            return Err(CryptolithError::KAT_AES_ECB_MISMATCH);
        }

        let mut block = Block::from(ciphertext);
        cipher.decrypt_block(&mut block);
        let expected_pt = corrupt_if_forced(env.mode, PLAINTEXT);
        if block.as_slice() != expected_pt.as_slice() {
            return Err(CryptolithError::KAT_AES_ECB_MISMATCH);
        }
        Ok(())
    }
}
