//! Sine-wave calibration
//!
//! Least-squares fit of accumulated bit-planes to a sinusoidal stimulus of
//! known frequency and sample interval.
//!
//! **Model** (per frame n, sample time t_n = n * dt):
//!
//! ```text
//! w1*bit1 + w2*bit2 + ... + wk*bitk = A + B*sin(2*pi*f*t_n) + C*cos(2*pi*f*t_n) + noise
//! ```
//!
//! where bit1..bitk are the significant bit-planes and w1 is normalized to
//! 1. Rearranged so the unknowns (A, B, C, w2..wk) form one vector:
//!
//! ```text
//! -bit1 = -A - B*sin(2*pi*f*t_n) - C*cos(2*pi*f*t_n) + w2*bit2 + ... + wk*bitk
//! ```
//!
//! One row per frame is stacked into a design matrix and solved as a
//! linear least-squares problem through the SVD pseudoinverse, never an
//! explicit matrix inversion. Sine and cosine regressors can alias with
//! bit columns at unfavorable frequency/sample-rate ratios, so the
//! singular values are inspected first and an ill-conditioned system is
//! reported instead of an unstable solution.
//!
//! The recovered stimulus is reported as `dc + amplitude*sin(2*pi*f*t + phase)`
//! with `amplitude = sqrt(B^2 + C^2)` and `phase = atan2(C, B)`.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector, SVD};
use snafu::{ensure, Snafu};
use tracing::{debug, info, instrument};

use crate::dataset::Dataset;
use crate::sync::{FIRST_SAR_PLANE, SAR_LEN, STAGE_LEN};

/// How many significant bits the weight model covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSpan {
    /// First SAR stage only (9 bits)
    Stage1,
    /// Both SAR stages (18 bits)
    Full,
}

impl WeightSpan {
    pub fn bit_count(self) -> usize {
        match self {
            WeightSpan::Stage1 => STAGE_LEN,
            WeightSpan::Full => SAR_LEN,
        }
    }
}

/// Which frames enter the fit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationScope {
    /// All accumulated frames, timed by their canonical frame index
    Pooled,
    /// Frames of a single channel, timed by their order within that channel
    PerChannel(usize),
}

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub span: WeightSpan,
    pub scope: CalibrationScope,
    /// Largest acceptable ratio of extreme singular values
    pub condition_limit: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            span: WeightSpan::Full,
            scope: CalibrationScope::Pooled,
            condition_limit: 1e8,
        }
    }
}

/// Calibrated linearization of the converter, valid for one
/// (frequency, sample interval) pair.
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    /// Per-bit weights, most significant first, `weights[0] == 1.0`
    pub weights: Vec<f64>,
    /// DC offset A of the fitted stimulus
    pub dc: f64,
    /// In-phase component B
    pub sin_coeff: f64,
    /// Quadrature component C
    pub cos_coeff: f64,
    /// sqrt(B^2 + C^2)
    pub amplitude: f64,
    /// atan2(C, B), radians; stimulus = dc + amplitude*sin(2*pi*f*t + phase)
    pub phase: f64,
    pub frequency: f64,
    pub time_step: f64,
    /// Frames that entered the fit
    pub rows: usize,
    /// Unknowns solved for
    pub cols: usize,
    /// Ratio of extreme singular values of the design matrix
    pub condition: f64,
    /// Root-mean-square residual of the fit
    pub residual_rms: f64,
}

#[derive(Debug, Snafu)]
pub enum CalibrationError {
    /// No unique least-squares minimizer
    #[snafu(display("underdetermined system: {rows} frames for {cols} unknowns"))]
    InsufficientData { rows: usize, cols: usize },

    /// Columns are collinear beyond the configured tolerance
    #[snafu(display(
        "design matrix is ill-conditioned: condition number {condition:.3e} exceeds {limit:.3e}"
    ))]
    IllConditioned { condition: f64, limit: f64 },
}

/// Fit the accumulated bit-planes to the sinusoid model.
///
/// # Arguments
/// * `dataset` - accumulated bit-planes
/// * `frequency` - stimulus frequency in Hz, supplied by the stimulus source
/// * `time_step` - uniform sample interval in seconds
/// * `config` - model span, scope, and conditioning tolerance
#[instrument(skip(dataset), fields(frames = dataset.len()))]
pub fn sine_calibration(
    dataset: &Dataset,
    frequency: f64,
    time_step: f64,
    config: &CalibrationConfig,
) -> Result<CalibrationModel, CalibrationError> {
    // (canonical plane index, time index) per selected frame
    let selected: Vec<(usize, usize)> = match config.scope {
        CalibrationScope::Pooled => (0..dataset.len()).map(|n| (n, n)).collect(),
        CalibrationScope::PerChannel(channel) => {
            let mut rows = Vec::new();
            let mut base = 0;
            for segment in dataset.segments() {
                if segment.channel == channel {
                    for n in 0..segment.frames {
                        rows.push((base + n, rows.len()));
                    }
                }
                base += segment.frames;
            }
            rows
        }
    };

    let bits = config.span.bit_count();
    let rows = selected.len();
    let cols = 3 + (bits - 1);
    ensure!(rows > cols, InsufficientDataSnafu { rows, cols });

    let omega = 2.0 * PI * frequency;
    let planes = dataset.planes();
    let design = DMatrix::<f64>::from_fn(rows, cols, |r, c| {
        let (n, tn) = selected[r];
        match c {
            0 => -1.0,
            1 => -(omega * tn as f64 * time_step).sin(),
            2 => -(omega * tn as f64 * time_step).cos(),
            _ => planes[FIRST_SAR_PLANE + c - 2][n] as f64,
        }
    });
    let target = DVector::<f64>::from_fn(rows, |r, _| {
        let (n, _) = selected[r];
        -(planes[FIRST_SAR_PLANE][n] as f64)
    });

    let svd = SVD::new(design.clone(), true, true);
    let (mut s_max, mut s_min) = (0.0f64, f64::INFINITY);
    for &s in svd.singular_values.iter() {
        s_max = s_max.max(s);
        s_min = s_min.min(s);
    }
    let condition = if s_min > 0.0 { s_max / s_min } else { f64::INFINITY };
    debug!(rows, cols, condition, "design matrix factored");
    ensure!(
        condition.is_finite() && condition <= config.condition_limit,
        IllConditionedSnafu {
            condition,
            limit: config.condition_limit,
        }
    );

    let solution = match svd.solve(&target, f64::EPSILON) {
        Ok(x) => x,
        Err(_) => {
            return Err(CalibrationError::IllConditioned {
                condition,
                limit: config.condition_limit,
            })
        }
    };

    let residual = &design * &solution - &target;
    let residual_rms = (residual.norm_squared() / rows as f64).sqrt();

    let dc = solution[0];
    let sin_coeff = solution[1];
    let cos_coeff = solution[2];
    let mut weights = Vec::with_capacity(bits);
    weights.push(1.0);
    for i in 0..bits - 1 {
        weights.push(solution[3 + i]);
    }

    let model = CalibrationModel {
        weights,
        dc,
        sin_coeff,
        cos_coeff,
        amplitude: (sin_coeff * sin_coeff + cos_coeff * cos_coeff).sqrt(),
        phase: cos_coeff.atan2(sin_coeff),
        frequency,
        time_step,
        rows,
        cols,
        condition,
        residual_rms,
    };
    info!(
        rows,
        cols,
        amplitude = model.amplitude,
        dc = model.dc,
        residual_rms,
        "calibration solved"
    );
    Ok(model)
}
