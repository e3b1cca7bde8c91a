/*++

Licensed under the Apache-2.0 license.

File Name:

    indicator_kat.rs

Abstract:

    File contains the Known Answer Test (KAT) for the service indicator
    oracle: its verdict over a fixed rule sample is the known answer.

--*/

use cryptolith_error::{CryptolithError, CryptolithResult};
use cryptolith_indicator::{allowed, allowed_mode, allowed_pbkdf2, MIN_PASSWORD_LEN};

use crate::PostEnv;

#[derive(Default, Debug)]
pub struct IndicatorKat {}

impl IndicatorKat {
    /// Executes the indicator oracle KAT.
    pub fn execute(&self, env: &PostEnv) -> CryptolithResult<()> {
        let mut ok = true;

        ok &= allowed(Some("check-integrity"), None);
        ok &= allowed(Some("sha256"), None);
        ok &= allowed(Some("shake256"), None);

        for key_byte_length in [16usize, 24, 32] {
            ok &= allowed_mode(Some("aes-ecb"), key_byte_length);
            ok &= allowed_mode(Some("aes-cbc"), key_byte_length);
            ok &= allowed_mode(Some("aes-ctr"), key_byte_length);
            ok &= allowed_mode(Some("aes-gcm"), key_byte_length);
            ok &= allowed_mode(Some("aes-keywrap"), key_byte_length);
        }
        ok &= allowed_mode(Some("aes-xts"), 16);
        ok &= allowed_mode(Some("aes-xts"), 32);
        ok &= !allowed_mode(Some("aes-xts"), 24);
        ok &= !allowed_mode(Some("aes-cbc"), 20);

        ok &= allowed(Some("hmac"), Some("sha1"));
        ok &= allowed(Some("hmac"), Some("sha3-512"));
        ok &= !allowed(Some("hmac"), Some("md5"));

        ok &= allowed(Some("ecdsa-sign"), Some("p-256"));
        ok &= allowed(Some("ecdsa-verify"), Some("p-192"));
        ok &= !allowed(Some("ecdsa-sign"), Some("p-192"));

        ok &= allowed(Some("rsa-sign"), Some("2048"));
        ok &= !allowed(Some("rsa-sign"), Some("1024"));
        ok &= allowed(Some("rsa-verify"), Some("1024"));

        ok &= allowed_pbkdf2(Some("sha256"), MIN_PASSWORD_LEN);
        ok &= !allowed_pbkdf2(Some("sha256"), MIN_PASSWORD_LEN - 1);

        ok &= !allowed(None, None);
        ok &= !allowed_mode(None, 16);

        // The combined verdict is the known answer; force-fail inverts it so
        // this test fails alongside the others.
        if env.mode.force_fail() {
            ok = !ok;
        }
        if !ok {
            return Err(CryptolithError::KAT_INDICATOR_MISMATCH);
        }
        Ok(())
    }
}
