//! Frame synchronization
//!
//! Locates the header position inside an unlabeled capture bit stream.
//!
//! **Frame structure**:
//! - Every conversion occupies a fixed 20-sample frame
//! - Samples 0-1 of the frame are the header, samples 2-19 are the two
//!   9-bit SAR stages
//! - The first header bit alternates 1,0,1,0,... from frame to frame; the
//!   capture may begin anywhere inside a frame, so the header lands at a
//!   fixed but unknown intra-frame offset
//!
//! **Algorithm**:
//! Scan candidate offsets 0..20 in ascending order. A candidate k passes
//! when every sample found at k, k+20, k+40, ... equals the first such
//! sample XOR (frame index mod 2), i.e. the plane at k is a strict
//! alternation. The first passing candidate wins, which pins offset 0 as
//! the preferred answer on degenerate input. A stream with no passing
//! candidate is a synchronization failure, never a silent offset 0.
//!
//! **Reliability**:
//! A non-header plane passes by chance with probability about 2^-N over N
//! frames. Callers should only trust a discovered offset when at least
//! [`MIN_SYNC_FRAMES`] complete frames were available; the ingest pipeline
//! in [`crate::dataset`] enforces that contract, not this module.

use snafu::Snafu;
use tracing::{debug, trace};

/// Samples per captured conversion frame
pub const FRAME_LEN: usize = 20;

/// Header samples at the start of each frame
pub const HEADER_LEN: usize = 2;

/// Significant bits per SAR stage
pub const STAGE_LEN: usize = 9;

/// Total significant bits per frame (two SAR stages)
pub const SAR_LEN: usize = 2 * STAGE_LEN;

/// Intra-frame position of the first significant bit
pub const FIRST_SAR_PLANE: usize = HEADER_LEN;

/// Default minimum number of complete frames before a discovered offset
/// is considered trustworthy (false-sync probability about 20 * 2^-N)
pub const MIN_SYNC_FRAMES: usize = 8;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum SyncError {
    /// No intra-frame offset carries the alternating header pattern
    #[snafu(display("alternating header pattern not found at any of the {FRAME_LEN} candidate offsets"))]
    HeaderNotFound,
}

/// Number of complete frames a column of `len` samples holds past `offset`.
pub fn complete_frames(len: usize, offset: usize) -> usize {
    if len < offset {
        0
    } else {
        (len - offset) / FRAME_LEN
    }
}

/// Find the intra-frame offset of the alternating header bit.
///
/// Checks every sample of each candidate plane that exists in the column,
/// including one inside a trailing partial frame. All channels of a capture
/// are time-aligned, so one representative column is enough.
///
/// # Arguments
/// * `column` - one channel's raw sample column, bits in arrival order
///
/// # Returns
/// The offset in `0..20`, or [`SyncError::HeaderNotFound`] when no candidate
/// plane alternates over the whole column.
pub fn find_header_offset(column: &[u32]) -> Result<usize, SyncError> {
    for offset in 0..FRAME_LEN {
        if offset >= column.len() {
            break;
        }
        let first = column[offset];
        let mut frame = 0u32;
        let mut pos = offset;
        let mut alternating = true;
        while pos < column.len() {
            if column[pos] ^ (frame & 1) != first {
                alternating = false;
                break;
            }
            frame += 1;
            pos += FRAME_LEN;
        }
        if alternating {
            debug!(offset, frames = frame, "header pattern located");
            return Ok(offset);
        }
        trace!(offset, failed_at_frame = frame, "candidate offset rejected");
    }

    Err(SyncError::HeaderNotFound)
}
