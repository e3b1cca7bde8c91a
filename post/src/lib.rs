/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the public entry points for the Cryptolith POST
    subsystem and the kernel-target image cache.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod kats;
mod orchestrator;

pub use cryptolith_common::{expected_integrity_mac, PostMode};
pub use cryptolith_indicator::{allowed, allowed_mode, allowed_pbkdf2};
pub use cryptolith_trace::{parse_trace, NoopWriter, TraceRecorder, TraceWriter};
pub use kats::{AesCbcKat, AesEcbKat, HmacKat, IndicatorKat, Sha256Kat};
pub use orchestrator::{
    Post, PostEnv, PostFailure, PostReport, PostTest, PostTestResult, POST_TESTS,
};

fn run_post_resolved(mode: PostMode, image: Option<&[u8]>) -> i32 {
    if mode.is_disabled() {
        return 0;
    }

    let mut sink = NoopWriter;
    let mut recorder = TraceRecorder::new();
    if mode.is_trace() {
        // A sinkless session still exercises every checkpoint.
        let _ = recorder.start(mode, &mut sink);
    }

    let env = PostEnv {
        mode,
        image,
        max_offset: 0,
        expected_mac: expected_integrity_mac(),
    };
    let report = Post::run(&env, &mut recorder);
    let aggregate = report.aggregate();

    if recorder.is_active() {
        let _ = recorder.end(aggregate as u32);
    }

    if mode.is_no_panic() {
        0
    } else {
        aggregate
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "kernel")] {
        use std::sync::Mutex;

        // The only cross-run state in the subsystem: kernel hooks cannot
        // always re-supply the image, so the latest one supplied is kept.
        // Not re-entrant, like the rest of the POST contract.
        static CACHED_IMAGE: Mutex<Option<&'static [u8]>> = Mutex::new(None);

        /// Run the POST schedule. A non-zero return is expected to be
        /// treated as fatal by the caller unless the no-panic bit is set.
        ///
        /// On kernel targets every call that supplies an image refreshes
        /// the cached handle, even when the run itself fails; a call
        /// passing `None` reuses the cached one.
        pub fn run_post(mode_raw: u32, image: Option<&'static [u8]>) -> i32 {
            let mode = PostMode::from_raw(mode_raw);
            let mut cached = CACHED_IMAGE
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if image.is_some() {
                *cached = image;
            }
            run_post_resolved(mode, *cached)
        }
    } else {
        /// Run the POST schedule. A non-zero return is expected to be
        /// treated as fatal by the caller unless the no-panic bit is set.
        pub fn run_post(mode_raw: u32, image: Option<&[u8]>) -> i32 {
            run_post_resolved(PostMode::from_raw(mode_raw), image)
        }
    }
}
