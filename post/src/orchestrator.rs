/*++

Licensed under the Apache-2.0 license.

File Name:

    orchestrator.rs

Abstract:

    File contains the POST orchestrator: the fixed test schedule, the
    per-test report, and the aggregate result encoding.

--*/

use alloc::vec::Vec;
use core::time::Duration;

use cryptolith_common::PostMode;
use cryptolith_error::{CryptolithError, CryptolithResult};
use cryptolith_integrity::check_integrity;
use cryptolith_trace::TraceRecorder;

use crate::kats::{AesCbcKat, AesEcbKat, HmacKat, IndicatorKat, Sha256Kat};

/// Everything one POST run needs, threaded through every test.
pub struct PostEnv<'a> {
    pub mode: PostMode,

    /// The module's own loaded image, if the caller can supply it.
    pub image: Option<&'a [u8]>,

    /// Upper bound on the image region the integrity walk may touch;
    /// zero means the whole slice.
    pub max_offset: usize,

    /// Precomputed code-section MAC to verify against.
    pub expected_mac: &'a [u8; 32],
}

/// One entry of the fixed test schedule.
pub struct PostTest {
    pub name: &'static str,
    pub run: fn(&PostEnv) -> CryptolithResult<()>,
}

/// Tests run after the HMAC KAT and the integrity check, in this order.
/// The order is part of the external aggregate encoding.
pub const POST_TESTS: &[PostTest] = &[
    PostTest {
        name: "post_indicator",
        run: |env| IndicatorKat::default().execute(env),
    },
    PostTest {
        name: "post_sha256",
        run: |env| Sha256Kat::default().execute(env),
    },
    PostTest {
        name: "post_aes_ecb",
        run: |env| AesEcbKat::default().execute(env),
    },
    PostTest {
        name: "post_aes_cbc",
        run: |env| AesCbcKat::default().execute(env),
    },
];

/// Outcome of one scheduled test.
#[derive(Debug, Clone)]
pub struct PostTestResult {
    pub name: &'static str,
    pub status: CryptolithResult<()>,

    /// Wall-clock duration, captured for diagnostics on std builds only.
    pub duration: Option<Duration>,
}

/// The first failure of a run; later failures stay in the per-test results
/// but never displace this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFailure {
    pub name: &'static str,

    /// 1-based position in the schedule; 0 for pre-flight failures.
    pub ordinal: usize,

    pub error: CryptolithError,
}

/// Full report of one POST run.
#[derive(Debug, Default)]
pub struct PostReport {
    pub results: Vec<PostTestResult>,
    pub failure: Option<PostFailure>,
}

impl PostReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// The external aggregate result: zero on success, otherwise the failing
    /// test's ordinal and failure class folded into one signed integer.
    pub fn aggregate(&self) -> i32 {
        match &self.failure {
            None => 0,
            Some(failure) => {
                -((failure.ordinal as i32) * 1000) + failure.error.post_class() as i32
            }
        }
    }
}

pub struct Post {}

impl Post {
    /// Run the full POST schedule against `env`.
    ///
    /// Never stops on a failing test; only the first failure becomes the
    /// canonical cause. The recorder is used as-is: an inactive recorder
    /// drops all checkpoints, and finalizing an active one is the caller's
    /// job.
    pub fn run(env: &PostEnv, recorder: &mut TraceRecorder) -> PostReport {
        let mut report = PostReport::default();

        if env.mode.is_disabled() {
            return report;
        }

        // The integrity walk needs the image up front; without one there is
        // nothing trustworthy to report about.
        if !env.mode.is_no_integrity() && env.image.is_none() {
            report.failure = Some(PostFailure {
                name: "post_integrity",
                ordinal: 0,
                error: CryptolithError::POST_IMAGE_UNAVAILABLE,
            });
            return report;
        }

        // The digest mechanism itself is tested before anything built on it.
        Self::run_test(env, recorder, &mut report, "post_hmac", |env| {
            HmacKat::default().execute(env)
        });

        if !env.mode.is_no_integrity() {
            Self::run_test(env, recorder, &mut report, "post_integrity", |env| {
                let image = env.image.ok_or(CryptolithError::POST_IMAGE_UNAVAILABLE)?;
                check_integrity(env.mode, image, env.max_offset, env.expected_mac)
            });
        }

        for test in POST_TESTS {
            Self::run_test(env, recorder, &mut report, test.name, test.run);
        }

        report
    }

    fn run_test(
        env: &PostEnv,
        recorder: &mut TraceRecorder,
        report: &mut PostReport,
        name: &'static str,
        run: impl FnOnce(&PostEnv) -> CryptolithResult<()>,
    ) {
        recorder.record(TraceRecorder::TEST_STR);
        recorder.record(name);

        #[cfg(feature = "std")]
        let started = std::time::Instant::now();
        let status = run(env);
        #[cfg(feature = "std")]
        let duration = Some(started.elapsed());
        #[cfg(not(feature = "std"))]
        let duration = None;

        let ordinal = report.results.len() + 1;
        if let Err(error) = status {
            if report.failure.is_none() {
                report.failure = Some(PostFailure {
                    name,
                    ordinal,
                    error,
                });
            }
        }
        report.results.push(PostTestResult {
            name,
            status,
            duration,
        });
    }
}
