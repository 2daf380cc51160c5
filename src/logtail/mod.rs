//! Decimated, most-recent-first tail of an append-only text log.
//!
//! The log is owned by an external writer; records are opaque lines. Rotation
//! or truncation during a read is not detected.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, thiserror::Error)]
pub enum LogTailError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LogTailError>;

/// How many trailing records to take, and the stride applied after reversing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailRequest {
    num_recs: usize,
    skip: usize,
}

impl TailRequest {
    /// Both values must be at least 1.
    pub fn new(num_recs: usize, skip: usize) -> Result<Self> {
        if num_recs == 0 {
            return Err(LogTailError::InvalidParameter("num_recs must be >= 1".into()));
        }
        if skip == 0 {
            return Err(LogTailError::InvalidParameter("skip must be >= 1".into()));
        }
        Ok(Self { num_recs, skip })
    }

    /// Parse the raw query values. Missing, non-numeric, zero and negative values are rejected.
    pub fn parse(num_recs: Option<&str>, skip: Option<&str>) -> Result<Self> {
        let num_recs = parse_positive("num_recs", num_recs)?;
        let skip = parse_positive("skip", skip)?;
        Self::new(num_recs, skip)
    }

    pub fn num_recs(&self) -> usize {
        self.num_recs
    }

    pub fn skip(&self) -> usize {
        self.skip
    }
}

fn parse_positive(name: &str, raw: Option<&str>) -> Result<usize> {
    let raw = raw
        .map(str::trim)
        .ok_or_else(|| LogTailError::InvalidParameter(format!("{} is required", name)))?;
    match raw.parse::<usize>() {
        Ok(0) => Err(LogTailError::InvalidParameter(format!("{} must be >= 1", name))),
        Ok(value) => Ok(value),
        Err(_) => Err(LogTailError::InvalidParameter(format!(
            "{} must be a positive integer, got {:?}",
            name, raw
        ))),
    }
}

/// Take the last `num_recs` lines of `contents`, newest first, keeping every `skip`-th one.
pub fn tail_lines(contents: &str, request: &TailRequest) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(request.num_recs);

    lines[start..]
        .iter()
        .rev()
        .step_by(request.skip)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Block size used when scanning the log backwards from its end.
const TAIL_CHUNK: u64 = 8 * 1024;

/// Read the end of `path` and apply [`tail_lines`]. The file is never written.
///
/// Only the trailing blocks holding the last `num_recs` records are read.
pub async fn tail_file(path: &Path, request: &TailRequest) -> Result<String> {
    let bytes = read_tail_bytes(path, request.num_recs, TAIL_CHUNK)
        .await
        .map_err(|source| LogTailError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let contents = String::from_utf8_lossy(&bytes);
    let tail = tail_lines(&contents, request);
    log::debug!(
        "Tailed {} (num_recs={}, skip={}): read {} bytes, returned {}",
        path.display(),
        request.num_recs,
        request.skip,
        bytes.len(),
        tail.len()
    );
    Ok(tail)
}

/// Read backwards in `chunk`-sized blocks until the suffix holds `num_recs + 1`
/// newlines or the start of the file is reached.
///
/// With that many newlines the suffix contains every byte of the last
/// `num_recs` records; anything before them is a partial record that
/// [`tail_lines`] discards.
async fn read_tail_bytes(path: &Path, num_recs: usize, chunk: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path).await?;
    let mut pos = file.metadata().await?.len();
    let needed = num_recs.saturating_add(1);
    let mut newlines = 0;
    let mut blocks: Vec<Vec<u8>> = Vec::new();

    while pos > 0 && newlines < needed {
        let step = chunk.min(pos);
        pos -= step;
        let mut block = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(pos)).await?;
        file.read_exact(&mut block).await?;
        newlines += block.iter().filter(|&&b| b == b'\n').count();
        blocks.push(block);
    }

    Ok(blocks.into_iter().rev().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_of(n: usize) -> String {
        (1..=n).map(|i| format!("rec{}\n", i)).collect()
    }

    #[test]
    fn newest_first_without_striding() {
        let req = TailRequest::new(5, 1).unwrap();
        assert_eq!(tail_lines(&log_of(8), &req), "rec8\nrec7\nrec6\nrec5\nrec4");
    }

    #[test]
    fn stride_two_over_ten() {
        let req = TailRequest::new(10, 2).unwrap();
        let out = tail_lines(&log_of(20), &req);
        assert_eq!(out, "rec20\nrec18\nrec16\nrec14\nrec12");
    }

    #[test]
    fn short_log_returns_everything_available() {
        let req = TailRequest::new(50, 1).unwrap();
        assert_eq!(tail_lines("a\nb\n", &req), "b\na");
        assert_eq!(tail_lines("", &req), "");
    }

    #[test]
    fn parse_rejects_bad_values() {
        for (n, s) in [
            (None, Some("1")),
            (Some("5"), None),
            (Some("five"), Some("1")),
            (Some("5"), Some("0")),
            (Some("5"), Some("-2")),
            (Some("0"), Some("1")),
            (Some("2.5"), Some("1")),
        ] {
            assert!(
                matches!(TailRequest::parse(n, s), Err(LogTailError::InvalidParameter(_))),
                "expected rejection for {:?}/{:?}",
                n,
                s
            );
        }
    }

    fn write_log(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reverse_reader_matches_full_read_across_block_boundaries() {
        let contents: String = (1..=200)
            .map(|i| format!("t={} v={}.{}\n", i, i % 7, i))
            .collect();
        let file = write_log(&contents);

        for chunk in [1, 7, 64, 4096] {
            for (num_recs, skip) in [(1, 1), (5, 1), (10, 2), (37, 3), (200, 1), (500, 4)] {
                let request = TailRequest::new(num_recs, skip).unwrap();
                let bytes = read_tail_bytes(file.path(), num_recs, chunk).await.unwrap();
                assert_eq!(
                    tail_lines(&String::from_utf8_lossy(&bytes), &request),
                    tail_lines(&contents, &request),
                    "chunk={} num_recs={} skip={}",
                    chunk,
                    num_recs,
                    skip
                );
            }
        }
    }

    #[tokio::test]
    async fn reverse_reader_stops_near_the_end_of_a_large_log() {
        let contents = log_of(10_000);
        let file = write_log(&contents);

        let bytes = read_tail_bytes(file.path(), 3, 64).await.unwrap();
        assert!(bytes.len() <= 128, "read {} bytes for a 3-record tail", bytes.len());

        let request = TailRequest::new(3, 1).unwrap();
        let tail = tail_file(file.path(), &request).await.unwrap();
        assert_eq!(tail, "rec10000\nrec9999\nrec9998");
    }

    #[tokio::test]
    async fn log_without_trailing_newline_keeps_last_record() {
        let file = write_log("a\nb\nc");
        let request = TailRequest::new(2, 1).unwrap();
        assert_eq!(tail_file(file.path(), &request).await.unwrap(), "c\nb");
    }

    #[tokio::test]
    async fn missing_log_is_io_error() {
        let request = TailRequest::new(2, 1).unwrap();
        let err = tail_file(Path::new("/nonexistent/voltage.log"), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, LogTailError::Io { .. }));
    }

    #[test]
    fn parse_accepts_padded_integers() {
        let req = TailRequest::parse(Some(" 10 "), Some("3")).unwrap();
        assert_eq!((req.num_recs(), req.skip()), (10, 3));
    }
}
