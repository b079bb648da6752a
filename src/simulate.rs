//! Synthetic capture generation
//!
//! Produces bit streams shaped like the converter's framed output: a
//! sinusoidal stimulus is SAR-converted against a known weight ladder,
//! framed with the alternating header, and serialized in the capture file
//! format. Used by the test suite and the `adcsim` binary to exercise the
//! whole pipeline against known ground truth.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::sync::{FRAME_LEN, SAR_LEN};

/// Sinusoidal stimulus description, `dc + amplitude*sin(2*pi*f*t + phase)`.
#[derive(Debug, Clone)]
pub struct Stimulus {
    pub frequency: f64,
    pub time_step: f64,
    pub dc: f64,
    pub amplitude: f64,
    pub phase: f64,
}

impl Stimulus {
    pub fn value_at(&self, t: f64) -> f64 {
        self.dc + self.amplitude * (2.0 * PI * self.frequency * t + self.phase).sin()
    }
}

/// Ideal binary weight ladder normalized to the most significant weight.
pub fn binary_weights(bits: usize) -> Vec<f64> {
    (0..bits).map(|i| 0.5f64.powi(i as i32)).collect()
}

/// Greedy successive-approximation conversion of `value` against a weight
/// ladder, most significant weight first. Values below the ladder give the
/// all-zeros code, values above it the all-ones code.
pub fn sar_convert(value: f64, weights: &[f64]) -> Vec<u32> {
    let mut remaining = value;
    weights
        .iter()
        .map(|&w| {
            if remaining >= w {
                remaining -= w;
                1
            } else {
                0
            }
        })
        .collect()
}

/// Synthetic capture generator.
///
/// Frames are generated for logical indices -1, 0, 1, ... and the stream
/// starts inside the extra leading frame, so the header of logical frame 0
/// lands exactly at `header_offset` and the m-th complete frame carries
/// the stimulus sampled at t = m * time_step.
#[derive(Debug, Clone)]
pub struct CaptureSim {
    pub stimulus: Stimulus,
    /// Per-bit weights, most significant first, one per significant plane
    pub weights: Vec<f64>,
    pub channels: usize,
    /// Intra-frame position the header lands on, in 0..20
    pub header_offset: usize,
    /// Complete frames per channel
    pub frames: usize,
    /// RMS of Gaussian noise added to the stimulus before conversion
    pub noise_rms: f64,
    pub seed: u64,
}

impl CaptureSim {
    /// Generate one sample column per channel.
    ///
    /// Conversion quantizes to the nearest code by offsetting the stimulus
    /// half of the smallest weight before the greedy descent. Channels see
    /// the same stimulus; with `noise_rms > 0` each channel gets its own
    /// seeded noise sequence.
    pub fn generate_columns(&self) -> Vec<Vec<u32>> {
        assert!(self.channels > 0, "at least one channel");
        assert_eq!(self.weights.len(), SAR_LEN, "one weight per significant plane");
        assert!(self.header_offset < FRAME_LEN, "offset must be inside a frame");

        let centering = 0.5 * self.weights[self.weights.len() - 1];
        let noise = if self.noise_rms > 0.0 {
            Some(Normal::new(0.0, self.noise_rms).expect("noise rms must be finite"))
        } else {
            None
        };

        let mut columns = Vec::with_capacity(self.channels);
        for channel in 0..self.channels {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(channel as u64));
            let mut column = Vec::with_capacity((self.frames + 1) * FRAME_LEN);
            for n in -1i64..self.frames as i64 {
                let t = n as f64 * self.stimulus.time_step;
                let mut value = self.stimulus.value_at(t);
                if let Some(noise) = &noise {
                    value += noise.sample(&mut rng);
                }
                column.push(if n.rem_euclid(2) == 0 { 1 } else { 0 });
                column.push(0);
                column.extend_from_slice(&sar_convert(value + centering, &self.weights));
            }
            // drop the leading frame's head so the capture starts mid-frame
            column.drain(..FRAME_LEN - self.header_offset);
            columns.push(column);
        }

        debug!(
            channels = self.channels,
            frames = self.frames,
            offset = self.header_offset,
            "synthetic capture generated"
        );
        columns
    }

    /// Write the capture in the delimited export format.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        let columns = self.generate_columns();
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        write!(out, "idx")?;
        for channel in 0..self.channels {
            write!(out, ",ch{}", channel + 1)?;
        }
        writeln!(out)?;

        for i in 0..columns[0].len() {
            write!(out, "{i}")?;
            for column in &columns {
                write!(out, ",{}", column[i])?;
            }
            writeln!(out)?;
        }
        out.flush()
    }
}
