/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the service indicator oracle: static rule tables stating
    which algorithm and parameter combinations are currently approved.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

/// Digests approved for standalone use and as MAC/KDF cores.
const APPROVED_DIGESTS: &[&str] = &[
    "sha1",
    "sha224",
    "sha256",
    "sha384",
    "sha512",
    "sha512-256",
    "sha3-224",
    "sha3-256",
    "sha3-384",
    "sha3-512",
];

/// Extendable-output functions, approved standalone only.
const APPROVED_XOFS: &[&str] = &["shake128", "shake256"];

/// RFC 3526 finite-field DH groups.
const APPROVED_FFDH_GROUPS: &[&str] = &[
    "ffdh-2048",
    "ffdh-3072",
    "ffdh-4096",
    "ffdh-6144",
    "ffdh-8192",
];

/// Curves approved for key generation, signing and agreement.
const APPROVED_CURVES: &[&str] = &["p-224", "p-256", "p-384", "p-521"];

/// Digests approved as the PBKDF2 PRF core. Narrower than the general set.
const PBKDF2_DIGESTS: &[&str] = &[
    "sha1",
    "sha224",
    "sha256",
    "sha384",
    "sha512",
    "sha512-256",
];

/// Minimum password byte length accepted for password-based KDFs.
pub const MIN_PASSWORD_LEN: usize = 14;

fn in_table(table: &[&str], name: &str) -> bool {
    table.iter().any(|&entry| entry == name)
}

fn decimal_bits(ctx: &str) -> Option<u64> {
    ctx.parse::<u64>().ok()
}

/// Whether `op`, optionally qualified by `ctx`, is an approved combination.
///
/// Unknown names and `None` evaluate to not approved; this function never
/// fails.
pub fn allowed(op: Option<&str>, ctx: Option<&str>) -> bool {
    let Some(op) = op else { return false };
    match ctx {
        None => {
            op == "check-integrity"
                || in_table(APPROVED_DIGESTS, op)
                || in_table(APPROVED_XOFS, op)
                || in_table(APPROVED_FFDH_GROUPS, op)
        }
        Some(ctx) => match op {
            "hmac" | "hkdf" | "kdf-ctr-hmac" => in_table(APPROVED_DIGESTS, ctx),
            "ecdsa-sign" | "ec-keygen" | "ecdh" => in_table(APPROVED_CURVES, ctx),
            // P-192 remains legal for verification of legacy signatures.
            "ecdsa-verify" => ctx == "p-192" || in_table(APPROVED_CURVES, ctx),
            "rsa-sign" => decimal_bits(ctx).is_some_and(|bits| bits >= 2048),
            "rsa-verify" => {
                decimal_bits(ctx).is_some_and(|bits| bits == 1024 || bits >= 2048)
            }
            _ => false,
        },
    }
}

/// Whether a symmetric cipher mode with the given key byte length is an
/// approved combination.
///
/// Mode names carry an `aes-` prefix; the generic `standard-` spelling is
/// accepted as an alias for the same modes.
pub fn allowed_mode(mode: Option<&str>, key_byte_length: usize) -> bool {
    let Some(mode) = mode else { return false };
    let Some(name) = mode
        .strip_prefix("aes-")
        .or_else(|| mode.strip_prefix("standard-"))
    else {
        return false;
    };
    match name {
        "ecb" | "cbc" | "ctr" | "cfb" | "cfb8" | "ofb" | "ccm" | "gcm" | "keywrap" => {
            matches!(key_byte_length, 16 | 24 | 32)
        }
        // Tweakable-width mode: the double-width 384-bit key is not legal.
        "xts" => matches!(key_byte_length, 16 | 32),
        _ => false,
    }
}

/// Whether PBKDF2 over `digest` with a password of `password_len` bytes is
/// an approved combination.
pub fn allowed_pbkdf2(digest: Option<&str>, password_len: usize) -> bool {
    let Some(digest) = digest else { return false };
    in_table(PBKDF2_DIGESTS, digest) && password_len >= MIN_PASSWORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_context_allow_list() {
        assert!(allowed(Some("check-integrity"), None));
        assert!(allowed(Some("sha256"), None));
        assert!(allowed(Some("shake128"), None));
        assert!(allowed(Some("ffdh-4096"), None));
        assert!(!allowed(Some("md5"), None));
        assert!(!allowed(Some("hmac"), None));
        assert!(!allowed(Some("ffdh-1024"), None));
    }

    #[test]
    fn test_hmac_digest_rules() {
        assert!(allowed(Some("hmac"), Some("sha1")));
        assert!(allowed(Some("hmac"), Some("sha3-512")));
        assert!(!allowed(Some("hmac"), Some("md5")));
        assert!(!allowed(Some("hmac"), Some("shake128")));
        assert!(allowed(Some("hkdf"), Some("sha256")));
        assert!(allowed(Some("kdf-ctr-hmac"), Some("sha512-256")));
    }

    #[test]
    fn test_curve_rules() {
        assert!(allowed(Some("ecdsa-sign"), Some("p-256")));
        assert!(!allowed(Some("ecdsa-sign"), Some("p-192")));
        assert!(allowed(Some("ecdsa-verify"), Some("p-192")));
        assert!(allowed(Some("ecdh"), Some("p-521")));
        assert!(!allowed(Some("ec-keygen"), Some("p-160")));
    }

    #[test]
    fn test_rsa_bit_length_rules() {
        assert!(allowed(Some("rsa-sign"), Some("2048")));
        assert!(allowed(Some("rsa-sign"), Some("3072")));
        assert!(!allowed(Some("rsa-sign"), Some("1024")));
        assert!(allowed(Some("rsa-verify"), Some("1024")));
        assert!(!allowed(Some("rsa-verify"), Some("1536")));
        assert!(!allowed(Some("rsa-sign"), Some("not-a-number")));
    }

    #[test]
    fn test_null_inputs_are_not_approved() {
        assert!(!allowed(None, None));
        assert!(!allowed(None, Some("sha256")));
        assert!(!allowed(Some("hmac"), Some("")));
        assert!(!allowed_mode(None, 16));
        assert!(!allowed_pbkdf2(None, 64));
    }

    #[test]
    fn test_cipher_mode_key_lengths() {
        for len in [16, 24, 32] {
            assert!(allowed_mode(Some("aes-cbc"), len));
            assert!(allowed_mode(Some("standard-cbc"), len));
        }
        assert!(!allowed_mode(Some("aes-cbc"), 20));
        assert!(!allowed_mode(Some("standard-cbc"), 20));
        assert!(allowed_mode(Some("aes-gcm"), 24));
        assert!(!allowed_mode(Some("aes-rc4"), 16));
        assert!(!allowed_mode(Some("cbc"), 16));
    }

    #[test]
    fn test_xts_excludes_triple_length() {
        assert!(allowed_mode(Some("aes-xts"), 16));
        assert!(allowed_mode(Some("aes-xts"), 32));
        assert!(!allowed_mode(Some("aes-xts"), 24));
    }

    #[test]
    fn test_pbkdf2_side_constraint() {
        assert!(allowed_pbkdf2(Some("sha256"), MIN_PASSWORD_LEN));
        assert!(!allowed_pbkdf2(Some("sha256"), MIN_PASSWORD_LEN - 1));
        assert!(!allowed_pbkdf2(Some("sha3-256"), 64));
        assert!(!allowed_pbkdf2(Some("md5"), 64));
    }
}
