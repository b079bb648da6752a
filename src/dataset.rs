//! Bit-plane dataset
//!
//! Owns the accumulated per-position bit series and the ingest pipeline
//! that grows them. Each ingested capture is loaded, synchronized against
//! the dataset's established header offset, then deinterleaved: starting
//! at the offset, every complete 20-sample frame contributes one sample to
//! each of the 20 bit-planes. Channels are walked in ascending index order
//! and files in arrival order, so the position of a sample inside a plane
//! (its canonical frame index) is reproducible and doubles as the sample
//! timestamp index for calibration.
//!
//! A failed ingest leaves the planes untouched; partial frames are never
//! accumulated. Ingest takes `&mut self`, so concurrent ingestion into one
//! dataset is serialized by the borrow checker.

use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt, Snafu};
use tracing::{debug, info, instrument};

use crate::capture::{self, CaptureError};
use crate::sync::{self, SyncError, FRAME_LEN, MIN_SYNC_FRAMES};

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("{}: {}", path.display(), source))]
    Capture { path: PathBuf, source: CaptureError },

    #[snafu(display("{}: {}", path.display(), source))]
    Sync { path: PathBuf, source: SyncError },

    /// Too few complete frames to trust a discovered header offset
    #[snafu(display(
        "{}: only {} complete frames, need at least {} to trust the header offset",
        path.display(), frames, required
    ))]
    TooFewFrames {
        path: PathBuf,
        frames: usize,
        required: usize,
    },

    /// Re-verification found a different offset than the dataset established
    #[snafu(display(
        "{}: header offset {} does not match established offset {}",
        path.display(), found, established
    ))]
    OffsetMismatch {
        path: PathBuf,
        found: usize,
        established: usize,
    },

    #[snafu(display("expected {expected} channel columns, got {found}"))]
    ColumnCount { expected: usize, found: usize },
}

/// Configuration for a bit-plane dataset
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Channel columns per capture file
    pub channels: usize,
    /// Minimum complete frames before a discovered header offset is trusted
    pub min_sync_frames: usize,
    /// Re-run header discovery on every file and require it to agree with
    /// the established offset (default: discover once, reuse)
    pub reverify_offset: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            channels: 3,
            min_sync_frames: MIN_SYNC_FRAMES,
            reverify_offset: false,
        }
    }
}

/// One contiguous run of frames appended to the planes by a single
/// channel of a single ingestion, in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSegment {
    pub channel: usize,
    pub frames: usize,
}

/// Accumulated bit-planes for one device under test.
///
/// `plane(j)` holds every bit captured at intra-frame position `j`,
/// concatenated channel-major across all ingested files. All 20 planes
/// have equal length at all times.
#[derive(Debug)]
pub struct Dataset {
    config: DatasetConfig,
    planes: Vec<Vec<u32>>,
    segments: Vec<PlaneSegment>,
    header_offset: Option<usize>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(DatasetConfig::default())
    }
}

impl Dataset {
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            config,
            planes: vec![Vec::new(); FRAME_LEN],
            segments: Vec::new(),
            header_offset: None,
        }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Header offset established by the first successful ingestion.
    pub fn header_offset(&self) -> Option<usize> {
        self.header_offset
    }

    /// Bit series at intra-frame position `j`.
    ///
    /// # Panics
    /// Panics if `j >= 20`.
    pub fn plane(&self, j: usize) -> &[u32] {
        &self.planes[j]
    }

    pub fn planes(&self) -> &[Vec<u32>] {
        &self.planes
    }

    /// Entries per plane, i.e. total accumulated frames.
    pub fn len(&self) -> usize {
        self.planes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append-order record of which channel contributed which frames.
    pub fn segments(&self) -> &[PlaneSegment] {
        &self.segments
    }

    /// Reassemble accumulated frame `n` from the planes, the inverse of
    /// deinterleaving.
    pub fn frame(&self, n: usize) -> Option<[u32; FRAME_LEN]> {
        if n >= self.len() {
            return None;
        }
        let mut out = [0u32; FRAME_LEN];
        for (j, plane) in self.planes.iter().enumerate() {
            out[j] = plane[n];
        }
        Some(out)
    }

    /// Load a capture file and fold it into the dataset.
    ///
    /// The first successful ingestion discovers the header offset; later
    /// ones reuse it (or re-verify it when the config asks for that). Any
    /// failure aborts the file with its identity attached and contributes
    /// nothing to the planes.
    ///
    /// # Returns
    /// Total frames appended across all channels.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<usize, IngestError> {
        let path = path.as_ref();
        let columns = capture::read_capture(path, self.config.channels)
            .context(CaptureSnafu { path })?;
        self.ingest_columns(path, &columns)
    }

    /// Fold pre-loaded sample columns into the dataset. `origin` labels the
    /// data in errors and logs; `ingest_file` passes the file path.
    pub fn ingest_columns(
        &mut self,
        origin: &Path,
        columns: &[Vec<u32>],
    ) -> Result<usize, IngestError> {
        ensure!(
            columns.len() == self.config.channels && !columns.is_empty(),
            ColumnCountSnafu {
                expected: self.config.channels.max(1),
                found: columns.len(),
            }
        );

        // Resolve the header offset before touching the planes. The
        // minimum-frame contract applies whenever an offset is discovered;
        // reusing an established offset carries no such requirement.
        let representative = &columns[0];
        let offset = match (self.header_offset, self.config.reverify_offset) {
            (Some(established), false) => established,
            (established, _) => {
                let found = sync::find_header_offset(representative)
                    .context(SyncSnafu { path: origin })?;
                let frames = sync::complete_frames(representative.len(), found);
                ensure!(
                    frames >= self.config.min_sync_frames,
                    TooFewFramesSnafu {
                        path: origin,
                        frames,
                        required: self.config.min_sync_frames,
                    }
                );
                if let Some(established) = established {
                    ensure!(
                        found == established,
                        OffsetMismatchSnafu {
                            path: origin,
                            found,
                            established,
                        }
                    );
                }
                found
            }
        };

        let mut appended = 0;
        for (channel, column) in columns.iter().enumerate() {
            let frames = sync::complete_frames(column.len(), offset);
            for n in 0..frames {
                let base = offset + n * FRAME_LEN;
                for (j, plane) in self.planes.iter_mut().enumerate() {
                    plane.push(column[base + j]);
                }
            }
            self.segments.push(PlaneSegment { channel, frames });
            appended += frames;
            debug!(channel, frames, "channel deinterleaved");
        }
        self.header_offset = Some(offset);

        info!(
            origin = %origin.display(),
            offset,
            appended,
            total = self.len(),
            "capture ingested"
        );
        Ok(appended)
    }
}
