//! Lazy log readers and file-level extraction.

use crate::error::ExtractError;
use crate::line::{CommitPattern, LineMatch, LineParser, SubmissionLineParser};
use cosmbench_types::{BlockTable, InsertOutcome, MergePolicy, SubmissionRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Single-pass iterator over the records of one log source.
///
/// Invalid UTF-8 is replaced rather than rejected; node logs occasionally
/// contain truncated multi-byte sequences.
pub struct LogReader<R, P> {
    reader: R,
    parser: P,
    name: String,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead, P: LineParser> LogReader<R, P> {
    /// Wrap `reader`. `name` identifies the source in error messages.
    pub fn new(reader: R, parser: P, name: impl Into<String>) -> Self {
        Self {
            reader,
            parser,
            name: name.into(),
            line_no: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead, P: LineParser> Iterator for LogReader<R, P> {
    type Item = Result<P::Record, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = String::from_utf8_lossy(&self.buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if let LineMatch::Record(record) = self.parser.parse(line) {
                        return Some(Ok(record));
                    }
                }
                Err(source) => {
                    return Some(Err(ExtractError::Read {
                        name: self.name.clone(),
                        line: self.line_no,
                        source,
                    }))
                }
            }
        }
    }
}

/// Reader over a submission log.
pub type SubmissionLogReader<R> = LogReader<R, SubmissionLineParser>;

/// Reader over a node log, yielding commit events.
pub type CommitLogReader<R> = LogReader<R, CommitPattern>;

fn open(path: &Path) -> Result<BufReader<File>, ExtractError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ExtractError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Read every record from a submission log file.
///
/// Fails with [`ExtractError::NoData`] when no line matched.
pub fn read_submission_log(path: &Path) -> Result<Vec<SubmissionRecord>, ExtractError> {
    let reader = LogReader::new(open(path)?, SubmissionLineParser, path.display().to_string());
    let records = reader.collect::<Result<Vec<_>, _>>()?;

    if records.is_empty() {
        return Err(ExtractError::NoData(path.display().to_string()));
    }

    info!(path = %path.display(), records = records.len(), "Parsed submission log");
    Ok(records)
}

/// Read commit events from several node logs into one height-keyed table.
///
/// Files are read in the given order, so with [`MergePolicy::FirstSeenWins`]
/// earlier files take precedence for a height.
pub fn read_commit_logs(
    paths: &[PathBuf],
    pattern: &CommitPattern,
    policy: MergePolicy,
) -> Result<BlockTable, ExtractError> {
    let mut table = BlockTable::new(policy);
    let mut matched = 0usize;

    for path in paths {
        let reader = LogReader::new(open(path)?, pattern.clone(), path.display().to_string());
        let mut from_file = 0usize;

        for record in reader {
            let record = record?;
            from_file += 1;
            let height = record.height;
            match table.insert(record) {
                InsertOutcome::Inserted => {}
                InsertOutcome::Duplicate => {
                    debug!(%height, path = %path.display(), "Duplicate commit line");
                }
                InsertOutcome::Conflict => {
                    warn!(
                        %height,
                        path = %path.display(),
                        "Conflicting transaction count for height"
                    );
                }
            }
        }

        info!(path = %path.display(), records = from_file, "Parsed node log");
        matched += from_file;
    }

    if matched == 0 {
        let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let names = if names.is_empty() {
            "<no node logs>".to_string()
        } else {
            names.join(", ")
        };
        return Err(ExtractError::NoData(names));
    }

    Ok(table)
}

/// Node logs in `dir` whose file name is `<prefix>*.log`, sorted by name.
pub fn find_node_logs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ExtractError::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut logs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ExtractError::Read {
            name: dir.display().to_string(),
            line: 0,
            source,
        })?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".log"));
        if matches && path.is_file() {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmbench_types::{BlockHeight, TxIndex};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_reader_skips_non_matching_lines() {
        let input = "Loaded 2 transactions\ntxIdx: 0 time: 1000 height: 5\n\ngarbage\ntxIdx: 1 time: 1200 height: 6";
        let reader = SubmissionLogReader::new(Cursor::new(input), SubmissionLineParser, "mem");

        let records: Vec<_> = reader.map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tx_idx, TxIndex(1));
    }

    #[test]
    fn test_reader_is_idempotent() {
        let input = "txIdx: 0 time: 1000 height: 5\r\ntxIdx: 1 time: 1200 height: unknown\r\n";
        let first: Vec<_> = SubmissionLogReader::new(Cursor::new(input), SubmissionLineParser, "a")
            .collect::<Result<_, _>>()
            .unwrap();
        let second: Vec<_> = SubmissionLogReader::new(Cursor::new(input), SubmissionLineParser, "b")
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_reader_tolerates_invalid_utf8() {
        let mut input = b"1000 INF committed state height=3 \xff\xfe\n".to_vec();
        input.extend_from_slice(b"1100 INF committed state height=4\n");
        let reader = CommitLogReader::new(Cursor::new(input), CommitPattern::default(), "node");

        let heights: Vec<_> = reader.map(|r| r.unwrap().height).collect();
        assert_eq!(heights, vec![BlockHeight(3), BlockHeight(4)]);
    }

    #[test]
    fn test_read_submission_log_no_data() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tx_log.txt", "nothing to see\n");

        let err = read_submission_log(&path).unwrap_err();
        assert!(matches!(err, ExtractError::NoData(_)));
    }

    #[test]
    fn test_read_submission_log_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_submission_log(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Open { .. }));
    }

    #[test]
    fn test_merge_node_logs_first_seen_wins() {
        let dir = TempDir::new().unwrap();
        let a = write_file(
            &dir,
            "output0.log",
            "1000 INF committed state height=6 num_txs=1\n1050 INF committed state height=7 num_txs=2\n",
        );
        let b = write_file(
            &dir,
            "output1.log",
            "1010 INF committed state height=6 num_txs=1\n1090 INF committed state height=7 num_txs=2\n1200 INF committed state height=8\n",
        );

        let table =
            read_commit_logs(&[a, b], &CommitPattern::default(), MergePolicy::FirstSeenWins)
                .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(BlockHeight(7)).unwrap().committed_at_ms, 1050);
        assert_eq!(table.get(BlockHeight(8)).unwrap().committed_at_ms, 1200);
        assert_eq!(table.duplicates(), 2);
    }

    #[test]
    fn test_read_commit_logs_no_data() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "output0.log", "1000 INF started node\n");

        let err = read_commit_logs(&[a], &CommitPattern::default(), MergePolicy::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoData(_)));

        let err = read_commit_logs(&[], &CommitPattern::default(), MergePolicy::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoData(_)));
    }

    #[test]
    fn test_find_node_logs_sorted() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "output2.log", "");
        write_file(&dir, "output0.log", "");
        write_file(&dir, "tx_log.txt", "");
        write_file(&dir, "output1.txt", "");

        let logs = find_node_logs(dir.path(), "output").unwrap();
        let names: Vec<_> = logs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["output0.log", "output2.log"]);
    }
}
