//! Quality-to-level mapping and per-level round trips for the zlib backend.
//!
//! Covers:
//! 1. The 0..=100 quality scale and its clamping at the boundaries
//! 2. Round trips for every effective level on differently shaped data
//! 3. Compression ratio ordering between the extremes
//! 4. Property-based round trips over arbitrary payloads

use compress::zlib::{CompressionLevel, MAX_QUALITY};
use compress::{CodecEngine, EngineParams, Mode, Status, compress_to_vec, decompress_to_vec};
use proptest::prelude::*;

fn params_for_quality(quality: u8) -> EngineParams {
    EngineParams::default().with_quality(quality).unwrap()
}

fn repetitive_text(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Linear congruential noise; deterministic but poorly compressible.
fn incompressible_data(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_F491;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

// =============================================================================
// SECTION 1: Quality Mapping
// =============================================================================

#[test]
fn quality_zero_stores_without_compression() {
    assert_eq!(
        CompressionLevel::from_quality(0).unwrap(),
        CompressionLevel::Store
    );
}

#[test]
fn quality_above_maximum_is_rejected() {
    let error = CompressionLevel::from_quality(MAX_QUALITY + 1).unwrap_err();
    assert_eq!(error.level(), u32::from(MAX_QUALITY + 1));
    assert!(error.to_string().contains("0-100"));
    assert!(EngineParams::default().with_quality(101).is_err());
}

#[test]
fn quality_scale_is_monotonic() {
    fn rank(level: CompressionLevel) -> u32 {
        match level {
            CompressionLevel::Store => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Precise(value) => u32::from(value.get()),
        }
    }

    let mut previous = 0;
    for quality in 0..=MAX_QUALITY {
        let current = rank(CompressionLevel::from_quality(quality).unwrap());
        assert!(current >= previous, "quality {quality} dropped the level");
        previous = current;
    }
    assert_eq!(previous, 9);
}

#[test]
fn numeric_levels_outside_one_to_nine_are_rejected() {
    assert!(CompressionLevel::from_numeric(0).is_err());
    assert!(CompressionLevel::from_numeric(10).is_err());
    for level in 1..=9 {
        assert!(CompressionLevel::from_numeric(level).is_ok());
    }
}

// =============================================================================
// SECTION 2: Round Trips Per Level
// =============================================================================

#[test]
fn every_quality_round_trips_text() {
    let input = repetitive_text(20_000);
    for quality in (0..=MAX_QUALITY).step_by(5) {
        let encoded = compress_to_vec(&input, params_for_quality(quality)).unwrap();
        let decoded = decompress_to_vec(&encoded, EngineParams::default()).unwrap();
        assert_eq!(decoded, input, "quality {quality}");
    }
}

#[test]
fn every_quality_round_trips_noise() {
    let input = incompressible_data(32 * 1024);
    for quality in [0, 1, 50, 90, 100] {
        let encoded = compress_to_vec(&input, params_for_quality(quality)).unwrap();
        let decoded = decompress_to_vec(&encoded, EngineParams::default()).unwrap();
        assert_eq!(decoded, input, "quality {quality}");
    }
}

#[test]
fn store_level_output_is_not_smaller_than_input() {
    let input = repetitive_text(10_000);
    let stored = compress_to_vec(&input, params_for_quality(0)).unwrap();
    assert!(stored.len() >= input.len());
}

// =============================================================================
// SECTION 3: Ratio Ordering
// =============================================================================

#[test]
fn highest_quality_beats_lowest_nonzero_quality_on_text() {
    let input = repetitive_text(200_000);
    let fast = compress_to_vec(&input, params_for_quality(5)).unwrap();
    let best = compress_to_vec(&input, params_for_quality(100)).unwrap();
    assert!(best.len() <= fast.len());
    assert!(best.len() < input.len() / 20);
}

#[test]
fn engine_totals_reflect_ratio() {
    let input = repetitive_text(100_000);
    let mut engine = CodecEngine::new(Mode::Compress, params_for_quality(90)).unwrap();
    let mut output = vec![0u8; input.len()];
    let step = engine.transform(&input, &mut output, true);
    assert_eq!(step.status, Status::Finished);
    assert_eq!(engine.total_in(), input.len() as u64);
    assert!(engine.total_out() < engine.total_in() / 10);
}

// =============================================================================
// SECTION 4: Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_payloads_round_trip(
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
        quality in 0u8..=100,
    ) {
        let encoded = compress_to_vec(&payload, params_for_quality(quality)).unwrap();
        let decoded = decompress_to_vec(&encoded, EngineParams::default()).unwrap();
        prop_assert_eq!(decoded, payload);
    }
}
