//! Calibration solver properties against simulated captures with known
//! ground truth

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sarcal::simulate::{binary_weights, CaptureSim, Stimulus};
use sarcal::sync::SAR_LEN;
use sarcal::{
    sine_calibration, CalibrationConfig, CalibrationScope, Dataset, DatasetConfig, WeightSpan,
};
use sarcal::calibrate::CalibrationError;

const DC: f64 = 0.93;
const AMPLITUDE: f64 = 0.41;
const PHASE: f64 = 0.7;
const TIME_STEP: f64 = 1e-6;

/// Frequency giving exactly 617 stimulus cycles per 4800-frame segment, so
/// concatenated channel segments stay phase-aligned under the canonical
/// frame index.
fn coherent_freq() -> f64 {
    617.0 / (4800.0 * TIME_STEP)
}

fn sim(channels: usize, frames: usize, frequency: f64, noise_rms: f64) -> CaptureSim {
    CaptureSim {
        stimulus: Stimulus {
            frequency,
            time_step: 1e-6,
            dc: DC,
            amplitude: AMPLITUDE,
            phase: PHASE,
        },
        weights: binary_weights(SAR_LEN),
        channels,
        header_offset: 0,
        frames,
        noise_rms,
        seed: 42,
    }
}

fn ingest(sim: &CaptureSim) -> Dataset {
    let mut dataset = Dataset::new(DatasetConfig {
        channels: sim.channels,
        ..DatasetConfig::default()
    });
    dataset
        .ingest_columns(Path::new("sim"), &sim.generate_columns())
        .unwrap();
    dataset
}

/// Noiseless capture with known binary weights: the solver recovers the
/// weight ladder and the stimulus to well under 1e-6.
#[test]
fn test_noiseless_recovery() {
    let sim = sim(1, 48_000, 12_937.0, 0.0);
    let dataset = ingest(&sim);

    let model =
        sine_calibration(&dataset, 12_937.0, 1e-6, &CalibrationConfig::default()).unwrap();

    assert_eq!(model.rows, 48_000);
    assert_eq!(model.cols, 20);
    assert_eq!(model.weights.len(), SAR_LEN);
    assert_eq!(model.weights[0], 1.0);
    for (i, &w) in model.weights.iter().enumerate() {
        let expected = 0.5f64.powi(i as i32);
        assert!(
            (w - expected).abs() < 1e-6,
            "w{} = {w}, expected {expected}",
            i + 1
        );
    }
    assert!((model.dc - DC).abs() < 1e-6, "dc = {}", model.dc);
    assert!(
        (model.amplitude - AMPLITUDE).abs() < 1e-6,
        "amplitude = {}",
        model.amplitude
    );
    assert!((model.phase - PHASE).abs() < 1e-6, "phase = {}", model.phase);
    assert!(model.residual_rms < 1e-5, "residual = {}", model.residual_rms);
}

/// Three channels pooled under the canonical frame index. The capture
/// length is an integer number of stimulus cycles, so the concatenated
/// channel segments stay phase-aligned and the pooled fit is exact.
#[test]
fn test_pooled_multi_channel_recovery() {
    let sim = sim(3, 4800, coherent_freq(), 0.0);
    let dataset = ingest(&sim);

    let model =
        sine_calibration(&dataset, coherent_freq(), TIME_STEP, &CalibrationConfig::default())
            .unwrap();

    assert_eq!(model.rows, 3 * 4800);
    assert!((model.dc - DC).abs() < 1e-6);
    assert!((model.amplitude - AMPLITUDE).abs() < 1e-6);
    assert!((model.phase - PHASE).abs() < 1e-6);
    for (i, &w) in model.weights.iter().enumerate() {
        assert!((w - 0.5f64.powi(i as i32)).abs() < 1e-6);
    }
}

/// Restricting the fit to one channel selects exactly that channel's
/// frames, re-timed from zero, and recovers the same stimulus.
#[test]
fn test_per_channel_scope() {
    let sim = sim(3, 4800, coherent_freq(), 0.0);
    let dataset = ingest(&sim);

    let config = CalibrationConfig {
        scope: CalibrationScope::PerChannel(1),
        ..CalibrationConfig::default()
    };
    let model = sine_calibration(&dataset, coherent_freq(), TIME_STEP, &config).unwrap();

    assert_eq!(model.rows, 4800);
    assert!((model.dc - DC).abs() < 1e-6);
    assert!((model.amplitude - AMPLITUDE).abs() < 1e-6);
}

/// The stage-1 span fits only the first 9 bits; the discarded low bits
/// act as a bounded disturbance.
#[test]
fn test_stage1_span() {
    let sim = sim(1, 4000, 12_937.0, 0.0);
    let dataset = ingest(&sim);

    let config = CalibrationConfig {
        span: WeightSpan::Stage1,
        ..CalibrationConfig::default()
    };
    let model = sine_calibration(&dataset, 12_937.0, 1e-6, &config).unwrap();

    assert_eq!(model.cols, 11);
    assert_eq!(model.weights.len(), 9);
    for (i, &w) in model.weights.iter().enumerate() {
        assert!(
            (w - 0.5f64.powi(i as i32)).abs() < 0.01,
            "w{} = {w}",
            i + 1
        );
    }
    assert!((model.dc - DC).abs() < 0.01);
    assert!((model.amplitude - AMPLITUDE).abs() < 0.01);
    assert!(model.residual_rms < 0.01, "residual = {}", model.residual_rms);
}

/// Quantization-scale stimulus noise degrades the fit gracefully.
#[test]
fn test_noisy_recovery_stays_close() {
    let sim = sim(1, 8000, 12_937.0, 0.002);
    let dataset = ingest(&sim);

    let model =
        sine_calibration(&dataset, 12_937.0, 1e-6, &CalibrationConfig::default()).unwrap();

    for (i, &w) in model.weights.iter().enumerate() {
        assert!((w - 0.5f64.powi(i as i32)).abs() < 1e-3, "w{} = {w}", i + 1);
    }
    assert!((model.dc - DC).abs() < 1e-3);
    assert!((model.amplitude - AMPLITUDE).abs() < 1e-3);
    assert!(model.residual_rms < 0.01);
}

/// Fewer frames than unknowns has no unique minimizer.
#[test]
fn test_underdetermined_capture() {
    let sim = sim(1, 20, 12_937.0, 0.0);
    let dataset = ingest(&sim);

    match sine_calibration(&dataset, 12_937.0, 1e-6, &CalibrationConfig::default()) {
        Err(CalibrationError::InsufficientData { rows, cols }) => {
            assert_eq!(rows, 20);
            assert_eq!(cols, 20);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

/// Two identical bit-planes make the design matrix rank-deficient; the
/// solver must report the conditioning instead of returning garbage.
#[test]
fn test_collinear_planes_are_reported() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut column = Vec::new();
    for n in 0..60u32 {
        column.push(1 - (n & 1));
        column.push(0);
        let mut bits = [0u32; 18];
        for b in bits.iter_mut() {
            *b = rng.random_range(0..2);
        }
        bits[2] = bits[1]; // planes 3 and 4 always agree
        column.extend_from_slice(&bits);
    }

    let mut dataset = Dataset::new(DatasetConfig {
        channels: 1,
        ..DatasetConfig::default()
    });
    dataset.ingest_columns(Path::new("sim"), &[column]).unwrap();

    match sine_calibration(&dataset, 12_937.0, 1e-6, &CalibrationConfig::default()) {
        Err(CalibrationError::IllConditioned { condition, limit }) => {
            assert!(condition > limit);
        }
        other => panic!("expected IllConditioned, got {other:?}"),
    }
}
