//! Latest height from the end of a live node log.

use crate::ansi::strip_ansi;
use crate::error::ExtractError;
use crate::line::key_value;
use cosmbench_types::BlockHeight;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Number of trailing lines inspected by default.
pub const DEFAULT_TAIL_LINES: usize = 10;

const TAIL_CHUNK: u64 = 8 * 1024;

/// Return up to `max_lines` complete lines from the end of the file.
///
/// Reads backwards in chunks so the cost does not grow with the log size.
pub fn read_tail_lines(path: &Path, max_lines: usize) -> Result<Vec<String>, ExtractError> {
    let read_err = |source| ExtractError::Read {
        name: path.display().to_string(),
        line: 0,
        source,
    };

    let mut file = File::open(path).map_err(|source| ExtractError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let len = file.metadata().map_err(read_err)?.len();

    let mut pos = len;
    let mut buf: Vec<u8> = Vec::new();
    while pos > 0 && buf.iter().filter(|&&b| b == b'\n').count() <= max_lines {
        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).map_err(read_err)?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).map_err(read_err)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.lines().collect();
    if pos > 0 && !lines.is_empty() {
        // first line may start mid-way
        lines.remove(0);
    }
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

/// Most recent non-zero `height=<n>` among the last `max_lines` lines,
/// newest first.
///
/// The result races with blocks committed concurrently; treat it as an
/// approximation of the inclusion height.
pub fn latest_height_in_tail(
    path: &Path,
    max_lines: usize,
) -> Result<Option<BlockHeight>, ExtractError> {
    let lines = read_tail_lines(path, max_lines)?;
    Ok(lines
        .iter()
        .rev()
        .find_map(|line| {
            key_value(&strip_ansi(line), "height=").and_then(BlockHeight::from_reported)
        }))
}
