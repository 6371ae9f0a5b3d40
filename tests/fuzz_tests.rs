//! Fuzz-style tests using proptest
//!
//! These provide fuzz-like testing without requiring nightly Rust or cargo-fuzz.
//! Run with: cargo test --test fuzz_tests

use proptest::prelude::*;

mod sharpness_fuzz {
    use super::*;
    use image::{Rgb, RgbImage};
    use stockcam::quality::{evaluate, SharpnessEvaluator};

    fn noise_frame(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut state = seed | 1;
        RgbImage::from_fn(width, height, |_, _| {
            // xorshift
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let v = (state & 0xff) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(17)])
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Same pixels, same score
        #[test]
        fn fuzz_score_is_deterministic(
            width in 1u32..400,
            height in 1u32..400,
            seed in any::<u64>(),
        ) {
            let frame = noise_frame(width, height, seed);
            let a = evaluate(&frame, 220.0);
            let b = evaluate(&frame, 220.0);
            prop_assert_eq!(a, b);
            prop_assert!(a.score >= 0.0);
            prop_assert!(a.score.is_finite());
        }

        /// Frames whose window is under the minimum always pass unchecked
        #[test]
        fn fuzz_tiny_frames_skip(
            short in 1u32..188,
            long in 1u32..2000,
            seed in any::<u64>(),
        ) {
            let frame = noise_frame(short, long.max(short), seed);
            let report = evaluate(&frame, f64::MAX);
            prop_assert!(report.skipped);
            prop_assert!(report.is_sharp);
        }

        /// The analysis window never exceeds the frame or the cap
        #[test]
        fn fuzz_window_bounds(width in 1u32..20000, height in 1u32..20000) {
            let side = SharpnessEvaluator::default().analysis_side(width, height);
            prop_assert!(side <= width.min(height));
            prop_assert!(side <= 768);
        }

        /// Raising the threshold never turns a blurry verdict sharp
        #[test]
        fn fuzz_threshold_monotonic(
            seed in any::<u64>(),
            low in 0.0f64..5000.0,
            delta in 0.0f64..5000.0,
        ) {
            let frame = noise_frame(256, 256, seed);
            let lenient = evaluate(&frame, low).is_sharp;
            let strict = evaluate(&frame, low + delta).is_sharp;
            prop_assert!(lenient || !strict);
        }
    }
}

mod postprocess_fuzz {
    use super::*;
    use stockcam::capture::postprocess::{process_file, read_exif_orientation, PostProcessOptions};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Arbitrary bytes never panic the EXIF reader
        #[test]
        fn fuzz_exif_reader(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
            let _ = read_exif_orientation(&bytes);
        }

        /// Undecodable captures surface as errors
        #[test]
        fn fuzz_process_garbage(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("garbage.jpg");
            std::fs::write(&path, &bytes).unwrap();
            let options = PostProcessOptions {
                square_crop: true,
                max_side: 3000,
                jpeg_quality: 92,
            };
            let _ = process_file(&path, &options);
        }
    }
}

mod scan_fuzz {
    use super::*;
    use stockcam::scan::{ScanDecision, ScanGate, ScanSession};

    fn session_strategy() -> impl Strategy<Value = ScanSession> {
        (
            prop::option::of("INV[0-9]{1,4}"),
            0u32..10,
            any::<bool>(),
        )
            .prop_map(|(current_inventory_id, photo_count, is_processing)| ScanSession {
                current_inventory_id,
                photo_count,
                is_processing,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Codes without the prefix are never accepted
        #[test]
        fn fuzz_prefix_required(
            code in "[A-Za-z0-9:/._-]{0,24}",
            session in session_strategy(),
            in_flight in any::<bool>(),
            logged in any::<bool>(),
        ) {
            let decision = ScanGate::default().on_scan(&code, &session, in_flight, logged);
            if !code.starts_with("INV") {
                prop_assert!(matches!(decision, ScanDecision::RejectedFormat | ScanDecision::Ignored));
            }
        }

        /// Re-scanning the active item is always a no-op
        #[test]
        fn fuzz_active_code_ignored(
            session in session_strategy(),
            in_flight in any::<bool>(),
            logged in any::<bool>(),
        ) {
            if let Some(id) = session.current_inventory_id.clone() {
                let decision = ScanGate::default().on_scan(&id, &session, in_flight, logged);
                prop_assert_eq!(decision, ScanDecision::Ignored);
            }
        }

        /// An item switch is only accepted once the minimum is reached
        #[test]
        fn fuzz_switch_needs_minimum(
            session in session_strategy(),
            code in "INV[0-9]{5}",
        ) {
            let decision = ScanGate::default().on_scan(&code, &session, false, false);
            if decision == ScanDecision::Accepted && session.is_active() {
                prop_assert!(session.photo_count >= 3);
            }
        }
    }
}

mod counter_fuzz {
    use super::*;
    use stockcam::capture::InFlightCounter;
    use stockcam::types::photo_name;

    proptest! {
        /// The in-flight count equals live tickets for any release order
        #[test]
        fn fuzz_in_flight_count(
            ops in prop::collection::vec(any::<bool>(), 0..64),
        ) {
            let counter = InFlightCounter::new();
            let mut tickets = Vec::new();
            for acquire in ops {
                if acquire {
                    tickets.push(counter.acquire());
                } else if !tickets.is_empty() {
                    let idx = tickets.len() / 2;
                    drop(tickets.swap_remove(idx));
                }
                prop_assert_eq!(counter.current(), tickets.len());
            }
            drop(tickets);
            prop_assert_eq!(counter.current(), 0);
        }

        /// Photo names never end up with a doubled dash
        #[test]
        fn fuzz_photo_name(id in "INV[0-9]{1,6}-?", index in 1u32..100) {
            let name = photo_name(&id, index);
            prop_assert!(!name.contains("--"));
            let suffix = format!("-{}", index);
            prop_assert!(name.ends_with(&suffix));
        }
    }
}
