// Licensed under the Apache-2.0 license

use cryptolith_error::CryptolithError;
use cryptolith_integrity::compute_code_mac;
use cryptolith_integrity::fake::FakeImage;
use cryptolith_post::{
    parse_trace, run_post, Post, PostEnv, PostMode, TraceRecorder,
};

const CODE: &[u8] = b"\x55\x48\x89\xe5\x31\xc0\x5d\xc3";

const FULL_SCHEDULE: &[&str] = &[
    "?",
    "post_hmac",
    "?",
    "post_integrity",
    "?",
    "post_indicator",
    "?",
    "post_sha256",
    "?",
    "post_aes_ecb",
    "?",
    "post_aes_cbc",
];

fn traced_run(mode: PostMode, env: &PostEnv) -> (Vec<String>, i32) {
    let mut buf = Vec::new();
    let mut recorder = TraceRecorder::new();
    recorder.start(mode, &mut buf).unwrap();
    let report = Post::run(env, &mut recorder);
    let aggregate = report.aggregate();
    recorder.end(aggregate as u32).unwrap();

    let artifact = parse_trace(&buf).unwrap();
    let names = artifact
        .event_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    (names, aggregate)
}

#[test]
fn test_successful_run_event_order() {
    let image = FakeImage::default().build(CODE);
    let expected = compute_code_mac(&image, 0).unwrap();
    let env = PostEnv {
        mode: PostMode::TRACE,
        image: Some(&image),
        max_offset: 0,
        expected_mac: &expected,
    };

    let (names, aggregate) = traced_run(PostMode::TRACE, &env);
    assert_eq!(aggregate, 0);

    let mut expected_events: Vec<String> =
        FULL_SCHEDULE.iter().map(|s| s.to_string()).collect();
    expected_events.push("-POST_SUCCESS".to_string());
    assert_eq!(names, expected_events);
}

#[test]
fn test_integrity_precedes_every_other_test() {
    let image = FakeImage::default().build(CODE);
    let expected = compute_code_mac(&image, 0).unwrap();

    for extra in [PostMode::empty(), PostMode::NO_PANIC] {
        let mode = PostMode::TRACE | extra;
        let env = PostEnv {
            mode,
            image: Some(&image),
            max_offset: 0,
            expected_mac: &expected,
        };
        let (names, _) = traced_run(mode, &env);

        let integrity_at = names
            .iter()
            .position(|n| n == "post_integrity")
            .expect("integrity event missing");
        for other in ["post_indicator", "post_sha256", "post_aes_ecb", "post_aes_cbc"] {
            let at = names.iter().position(|n| n == other).unwrap();
            assert!(integrity_at < at, "{other} ran before the integrity check");
        }
    }
}

#[test]
fn test_disabled_mode_runs_nothing() {
    let image = FakeImage::default().build(CODE);
    let expected = compute_code_mac(&image, 0).unwrap();

    // All other bits in combination with disable still short-circuit.
    for extra in [
        PostMode::empty(),
        PostMode::TRACE,
        PostMode::FORCE_FAIL_USER | PostMode::FORCE_FAIL_KERNEL,
        PostMode::NO_INTEGRITY | PostMode::NO_PANIC,
    ] {
        let mode = PostMode::DISABLE | extra;
        let env = PostEnv {
            mode,
            image: Some(&image),
            max_offset: 0,
            expected_mac: &expected,
        };
        let mut recorder = TraceRecorder::new();
        let report = Post::run(&env, &mut recorder);
        assert!(report.passed());
        assert!(report.results.is_empty());
    }
}

#[cfg(not(feature = "kernel"))]
#[test]
fn test_disabled_mode_entry_point() {
    let disable = PostMode::DISABLE.bits();
    assert_eq!(run_post(disable, None), 0);
    assert_eq!(run_post(disable | PostMode::TRACE.bits(), None), 0);
    assert_eq!(run_post(disable | PostMode::FORCE_FAIL_USER.bits(), None), 0);
}

#[cfg(not(feature = "kernel"))]
#[test]
fn test_force_fail_fails_every_test() {
    let image = FakeImage::default().build(CODE);
    let expected = compute_code_mac(&image, 0).unwrap();
    let mode = PostMode::TRACE | PostMode::FORCE_FAIL_USER;
    let env = PostEnv {
        mode,
        image: Some(&image),
        max_offset: 0,
        expected_mac: &expected,
    };

    let mut buf = Vec::new();
    let mut recorder = TraceRecorder::new();
    recorder.start(mode, &mut buf).unwrap();
    let report = Post::run(&env, &mut recorder);
    assert!(report.results.iter().all(|r| r.status.is_err()));

    // First failure is the HMAC KAT, ordinal 1, KAT class.
    let aggregate = report.aggregate();
    assert_eq!(aggregate, -1004);
    recorder.end(aggregate as u32).unwrap();

    let artifact = parse_trace(&buf).unwrap();
    let names = artifact.event_names();
    assert_eq!(*names.last().unwrap(), "-POST_FAILURE: 0xFFFFFC14");
}

#[test]
fn test_first_failure_is_canonical() {
    let image = FakeImage::default().build(CODE);
    let mut wrong = compute_code_mac(&image, 0).unwrap();
    wrong[0] ^= 0x01;
    let env = PostEnv {
        mode: PostMode::empty(),
        image: Some(&image),
        max_offset: 0,
        expected_mac: &wrong,
    };

    let mut recorder = TraceRecorder::new();
    let report = Post::run(&env, &mut recorder);

    // Only the integrity check fails; everything after it still runs.
    let failure = report.failure.unwrap();
    assert_eq!(failure.name, "post_integrity");
    assert_eq!(failure.ordinal, 2);
    assert_eq!(failure.error, CryptolithError::INTEGRITY_MAC_MISMATCH);
    assert_eq!(report.aggregate(), -2003);
    assert_eq!(report.results.len(), 6);
    assert_eq!(
        report.results.iter().filter(|r| r.status.is_err()).count(),
        1
    );
}

#[test]
fn test_missing_image_is_preflight_failure() {
    let mac = [0u8; 32];
    let env = PostEnv {
        mode: PostMode::empty(),
        image: None,
        max_offset: 0,
        expected_mac: &mac,
    };
    let mut recorder = TraceRecorder::new();
    let report = Post::run(&env, &mut recorder);
    assert!(report.results.is_empty());
    assert_eq!(report.aggregate(), -1);
}

#[cfg(not(feature = "kernel"))]
#[test]
fn test_missing_image_entry_point() {
    assert_eq!(run_post(0, None), -1);
}

#[cfg(not(feature = "kernel"))]
#[test]
fn test_no_integrity_runs_without_image() {
    assert_eq!(run_post(PostMode::NO_INTEGRITY.bits(), None), 0);
    assert_eq!(
        run_post((PostMode::NO_INTEGRITY | PostMode::TRACE).bits(), None),
        0
    );
}

#[cfg(not(feature = "kernel"))]
#[test]
fn test_no_panic_swallows_failure() {
    let no_integrity = PostMode::NO_INTEGRITY.bits();
    let force = PostMode::FORCE_FAIL_USER.bits();
    assert_eq!(run_post(no_integrity | force, None), -1004);
    assert_eq!(
        run_post(no_integrity | force | PostMode::NO_PANIC.bits(), None),
        0
    );
}

#[test]
fn test_durations_are_captured() {
    let mac = [0u8; 32];
    let env = PostEnv {
        mode: PostMode::NO_INTEGRITY,
        image: None,
        max_offset: 0,
        expected_mac: &mac,
    };
    let mut recorder = TraceRecorder::new();
    let report = Post::run(&env, &mut recorder);
    assert!(report.results.iter().all(|r| r.duration.is_some()));
}

#[cfg(feature = "kernel")]
#[test]
fn test_kernel_image_cache() {
    let image: &'static [u8] = Box::leak(FakeImage::default().build(CODE).into_boxed_slice());

    // The compiled-in expected MAC does not match the fake image, so the
    // integrity check fails, but the cached handle must keep later calls
    // from failing on image acquisition.
    let first = run_post(0, Some(image));
    assert_eq!(first, -2003);
    assert_eq!(run_post(0, None), first);

    // A failing run still caches the image it was handed: a later call with
    // an unparseable image fails on format (Library class) instead of MAC,
    // and an imageless call after it sees the refreshed handle.
    let mut bad = FakeImage::default().build(CODE);
    bad[0] = 0x7f;
    let bad: &'static [u8] = Box::leak(bad.into_boxed_slice());
    assert_eq!(run_post(0, Some(bad)), -2002);
    assert_eq!(run_post(0, None), -2002);
}
