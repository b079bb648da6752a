//! Capture file loading
//!
//! Reads the delimited text files exported by the capture hardware. Line 1
//! carries column labels and is discarded; every following line is
//! `index,ch1,ch2,...,chN` with one captured bit per channel field. The
//! index field is ignored. No quoting or escaping is supported.
//!
//! The file handle lives only for the duration of the call and is released
//! on every exit path, parse failures included.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::debug;

/// Field separator used by the capture export
pub const DELIMITER: char = ',';

#[derive(Debug, Snafu)]
pub enum CaptureError {
    /// A channel field did not parse as a 0/1 bit
    #[snafu(display("line {line}: field {field:?} is not a 0/1 bit"))]
    Format { line: usize, field: String },

    /// A data line is missing channel fields
    #[snafu(display("line {line}: expected at least {expected} fields, found {found}"))]
    MissingColumn {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[snafu(display("could not read capture file: {source}"))]
    Io { source: std::io::Error },
}

/// Read one capture file into per-channel sample columns.
///
/// # Arguments
/// * `path` - capture file to read
/// * `channels` - number of channel columns expected after the index field
///
/// # Returns
/// One `Vec<u32>` per channel, each holding that channel's bits in arrival
/// order. All returned columns have equal length. Blank lines are skipped.
pub fn read_capture(path: &Path, channels: usize) -> Result<Vec<Vec<u32>>, CaptureError> {
    let file = File::open(path).context(IoSnafu)?;
    let reader = BufReader::new(file);

    let mut columns = vec![Vec::new(); channels];
    for (index, line) in reader.lines().enumerate() {
        let line = line.context(IoSnafu)?;
        if index == 0 {
            continue; // column labels
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(DELIMITER).collect();
        ensure!(
            fields.len() >= channels + 1,
            MissingColumnSnafu {
                line: index + 1,
                expected: channels + 1,
                found: fields.len(),
            }
        );

        for (channel, field) in fields[1..=channels].iter().enumerate() {
            let bit = field
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&b| b <= 1)
                .context(FormatSnafu {
                    line: index + 1,
                    field: *field,
                })?;
            columns[channel].push(bit);
        }
    }

    debug!(
        path = %path.display(),
        channels,
        samples = columns.first().map(Vec::len).unwrap_or(0),
        "capture loaded"
    );
    Ok(columns)
}
