/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the status type and error constants used across the
    Cryptolith POST subsystem.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Cryptolith Error Type
///
/// A non-zero 32-bit status code. Zero is reserved for success, so every
/// error constant is representable as a `NonZeroU32`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CryptolithError(pub NonZeroU32);

/// Failure class reported at the external POST boundary.
///
/// The aggregate POST result folds the failing test's class into a single
/// signed integer, so these discriminants are part of the wire contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(i32)]
pub enum PostClass {
    /// Malformed input, workspace failure, or unsupported image format
    Generic = -1,

    /// An underlying primitive reported an internal error
    Library = -2,

    /// The module's own code digest did not match the expected value
    Integrity = -3,

    /// A computed value did not match a known answer
    Kat = -4,
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: CryptolithError = CryptolithError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl CryptolithError {
    /// Create a cryptolith error; intended to only be used from const
    /// contexts, as we don't want runtime panics if val is zero. The
    /// preferred way to get a CryptolithError from a u32 is
    /// `CryptolithError::try_from()`.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("CryptolithError cannot be 0"),
        }
    }

    define_error_constants![
        (
            TRACE_NOT_STARTED,
            0x0001_0001,
            "Trace Error: start requested without the trace mode flag or a sink"
        ),
        (
            TRACE_NOT_ACTIVE,
            0x0001_0002,
            "Trace Error: operation requires an active trace session"
        ),
        (
            TRACE_TABLE_FULL,
            0x0001_0003,
            "Trace Error: event interning table exhausted"
        ),
        (
            TRACE_WRITE_FAILED,
            0x0001_0004,
            "Trace Error: sink reported a write failure"
        ),
        (
            TRACE_NAME_TOO_LONG,
            0x0001_0005,
            "Trace Error: interned name cannot be pascal-encoded in one byte"
        ),
        (
            TRACE_EVENT_OVERFLOW,
            0x0001_0006,
            "Trace Error: maximum event count for one session exceeded"
        ),
        (
            TRACE_ARTIFACT_TRUNCATED,
            0x0001_0007,
            "Trace Error: artifact ends before the encoded structures do"
        ),
        (
            TRACE_ARTIFACT_MALFORMED,
            0x0001_0008,
            "Trace Error: artifact violates the trace wire format"
        ),
        (
            INTEGRITY_IMAGE_TOO_SMALL,
            0x0002_0001,
            "Integrity Error: image is smaller than the minimum two-header size"
        ),
        (
            INTEGRITY_UNSUPPORTED_IMAGE,
            0x0002_0002,
            "Integrity Error: image magic is not a recognized Mach-O variant"
        ),
        (
            INTEGRITY_BOUNDS_VIOLATION,
            0x0002_0003,
            "Integrity Error: a load command or section lies outside the valid region"
        ),
        (
            INTEGRITY_MALFORMED_COMMAND,
            0x0002_0004,
            "Integrity Error: load command too short to advance over"
        ),
        (
            INTEGRITY_CODE_SECTION_NOT_FOUND,
            0x0002_0005,
            "Integrity Error: no code section located in any load command"
        ),
        (
            INTEGRITY_MAC_MISMATCH,
            0x0002_0006,
            "Integrity Error: code-section MAC does not match the expected value"
        ),
        (
            INTEGRITY_MAC_INIT_FAILURE,
            0x0002_0007,
            "Integrity Error: keyed digest primitive failed to initialize"
        ),
        (
            KAT_HMAC_MISMATCH,
            0x0003_0001,
            "KAT Error: HMAC-SHA-256 known answer mismatch"
        ),
        (
            KAT_SHA256_MISMATCH,
            0x0003_0002,
            "KAT Error: SHA-256 known answer mismatch"
        ),
        (
            KAT_AES_ECB_MISMATCH,
            0x0003_0003,
            "KAT Error: AES-ECB known answer mismatch"
        ),
        (
            KAT_AES_CBC_MISMATCH,
            0x0003_0004,
            "KAT Error: AES-CBC known answer mismatch"
        ),
        (
            KAT_INDICATOR_MISMATCH,
            0x0003_0005,
            "KAT Error: indicator oracle returned an unexpected verdict"
        ),
        (
            POST_IMAGE_UNAVAILABLE,
            0x0004_0001,
            "POST Error: no image handle supplied and none cached"
        ),
    ];

    /// Map this error to the failure class folded into the aggregate result.
    pub fn post_class(&self) -> PostClass {
        match *self {
            Self::INTEGRITY_MAC_MISMATCH => PostClass::Integrity,
            Self::INTEGRITY_UNSUPPORTED_IMAGE | Self::INTEGRITY_MAC_INIT_FAILURE => {
                PostClass::Library
            }
            _ => match self.0.get() >> 16 {
                0x0003 => PostClass::Kat,
                _ => PostClass::Generic,
            },
        }
    }
}

impl From<core::num::NonZeroU32> for CryptolithError {
    fn from(val: core::num::NonZeroU32) -> Self {
        CryptolithError(val)
    }
}

impl From<CryptolithError> for core::num::NonZeroU32 {
    fn from(val: CryptolithError) -> Self {
        val.0
    }
}

impl From<CryptolithError> for u32 {
    fn from(val: CryptolithError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for CryptolithError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(CryptolithError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type CryptolithResult<T> = Result<T, CryptolithError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_try_from() {
        assert!(CryptolithError::try_from(0).is_err());
        assert_eq!(
            Ok(CryptolithError::TRACE_NOT_STARTED),
            CryptolithError::try_from(0x0001_0001)
        );
    }

    #[test]
    fn test_error_constants_uniqueness() {
        let constants = CryptolithError::all_constants();
        let mut error_values = HashSet::new();
        let mut duplicates = Vec::new();

        for (name, value) in constants {
            if !error_values.insert(value) {
                duplicates.push((name, value));
            }
        }

        assert!(
            duplicates.is_empty(),
            "Found duplicate error codes: {:?}",
            duplicates
        );
    }

    #[test]
    fn test_post_class_mapping() {
        assert_eq!(
            PostClass::Kat,
            CryptolithError::KAT_SHA256_MISMATCH.post_class()
        );
        assert_eq!(
            PostClass::Integrity,
            CryptolithError::INTEGRITY_MAC_MISMATCH.post_class()
        );
        assert_eq!(
            PostClass::Library,
            CryptolithError::INTEGRITY_UNSUPPORTED_IMAGE.post_class()
        );
        assert_eq!(
            PostClass::Generic,
            CryptolithError::INTEGRITY_BOUNDS_VIOLATION.post_class()
        );
        assert_eq!(
            PostClass::Generic,
            CryptolithError::TRACE_WRITE_FAILED.post_class()
        );
    }
}
