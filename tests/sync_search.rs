//! Synchronizer properties over synthetic and random streams

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sarcal::sync::{find_header_offset, SyncError, FRAME_LEN};

/// Tiling a frame pattern with the alternating bit at a chosen offset
/// always recovers exactly that offset.
#[test]
fn test_tiled_pattern_recovers_every_offset() {
    for offset in 0..FRAME_LEN {
        let frames = 12;
        let mut column = vec![0u32; frames * FRAME_LEN];
        for n in 0..frames {
            column[offset + n * FRAME_LEN] = 1 - (n as u32 & 1);
            // a second, constant marker elsewhere must not win
            let decoy = (offset + 9) % FRAME_LEN;
            column[decoy + n * FRAME_LEN] = 1;
        }
        assert_eq!(find_header_offset(&column), Ok(offset), "offset {offset}");
    }
}

/// A uniformly random stream of N frames passes some offset only with
/// probability about 20 * 2^-(N-1). Over many seeds the accidental sync
/// rate must stay near that bound.
#[test]
fn test_random_streams_rarely_carry_a_header() {
    let frames = 12;
    let trials = 500;
    let mut accidental = 0;

    for seed in 0..trials {
        let mut rng = StdRng::seed_from_u64(seed);
        let column: Vec<u32> = (0..frames * FRAME_LEN)
            .map(|_| rng.random_range(0..2u32))
            .collect();
        if find_header_offset(&column).is_ok() {
            accidental += 1;
        }
    }

    // expectation is about 5 hits (p ~ 20/2^11); 25 is many sigma out
    assert!(
        accidental <= 25,
        "{accidental}/{trials} random streams synchronized"
    );
}

/// A random stream that never syncs reports the error, not offset 0.
#[test]
fn test_failure_is_an_error_not_offset_zero() {
    let mut rng = StdRng::seed_from_u64(99);
    loop {
        let column: Vec<u32> = (0..12 * FRAME_LEN).map(|_| rng.random_range(0..2u32)).collect();
        match find_header_offset(&column) {
            Err(SyncError::HeaderNotFound) => break,
            Ok(_) => continue, // rare accidental sync, draw again
        }
    }
}
