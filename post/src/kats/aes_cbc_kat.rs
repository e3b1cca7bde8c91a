/*++

Licensed under the Apache-2.0 license.

File Name:

    aes_cbc_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for AES-128-CBC single-block
    encryption and decryption.

--*/

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cryptolith_error::{CryptolithError, CryptolithResult};

use crate::kats::corrupt_if_forced;
use crate::PostEnv;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
    0x3c,
];

const IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

const PLAINTEXT: [u8; 16] = [
    0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
    0x2a,
];

const CIPHERTEXT: [u8; 16] = [
    0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19,
    0x7d,
];

#[derive(Default, Debug)]
pub struct AesCbcKat {}

impl AesCbcKat {
    /// Executes the AES-128-CBC KATs.
    ///
    /// Test vector source: NIST SP 800-38A, F.2.1 and F.2.2 (first block).
    pub fn execute(&self, env: &PostEnv) -> CryptolithResult<()> {
        self.kat_encrypt(env)?;
        self.kat_decrypt(env)?;
        Ok(())
    }

    fn kat_encrypt(&self, env: &PostEnv) -> CryptolithResult<()> {
        let mut buf = PLAINTEXT;
        let ct = Aes128CbcEnc::new(&KEY.into(), &IV.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, PLAINTEXT.len())
            .map_err(|_| CryptolithError::KAT_AES_CBC_MISMATCH)?;
        let expected = corrupt_if_forced(env.mode, CIPHERTEXT);
        if ct != expected.as_slice() {
            return Err(CryptolithError::KAT_AES_CBC_MISMATCH);
        }
        Ok(())
    }

    fn kat_decrypt(&self, env: &PostEnv) -> CryptolithResult<()> {
        let mut buf = CIPHERTEXT;
        let pt = Aes128CbcDec::new(&KEY.into(), &IV.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptolithError::KAT_AES_CBC_MISMATCH)?;
        let expected = corrupt_if_forced(env.mode, PLAINTEXT);
        if pt != expected.as_slice() {
            return Err(CryptolithError::KAT_AES_CBC_MISMATCH);
        }
        Ok(())
    }
}
