//! Line-delimited inbound payload source.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::{AppError, AppResult};

/// Reads one payload per line from stdin or a file.
pub struct PayloadSource {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    path: Option<PathBuf>,
}

impl PayloadSource {
    /// Read payloads from `path`, or from stdin when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub async fn open(path: Option<&Path>) -> AppResult<Self> {
        let inner: Box<dyn AsyncRead + Send + Unpin> = match path {
            Some(path) => Box::new(
                File::open(path)
                    .await
                    .map_err(|err| AppError::io("payloads.open", Some(path.to_path_buf()), err))?,
            ),
            None => Box::new(tokio::io::stdin()),
        };
        Ok(Self::from_reader(inner, path.map(Path::to_path_buf)))
    }

    /// Wrap an arbitrary reader.
    #[must_use]
    pub fn from_reader(inner: Box<dyn AsyncRead + Send + Unpin>, path: Option<PathBuf>) -> Self {
        Self {
            reader: BufReader::new(inner),
            path,
        }
    }

    /// Next non-blank payload with its line terminator removed; `None` at end of input.
    ///
    /// Bytes are passed through untouched so invalid UTF-8 reaches the decoder.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying reader fails.
    pub async fn next_payload(&mut self) -> AppResult<Option<Vec<u8>>> {
        loop {
            let mut line = Vec::new();
            let read = self
                .reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|err| AppError::io("payloads.read", self.path.clone(), err))?;
            if read == 0 {
                return Ok(None);
            }
            strip_terminator(&mut line);
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(line));
            }
        }
    }
}

fn strip_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        let _ = line.pop();
        if line.last() == Some(&b'\r') {
            let _ = line.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

    fn source(input: &'static [u8]) -> PayloadSource {
        PayloadSource::from_reader(Box::new(input), None)
    }

    #[tokio::test]
    async fn skips_blank_lines_and_strips_terminators() -> TestResult<()> {
        let mut payloads = source(b"out/B1,Prime\r\n\n   \nout/B2,RRD");
        assert_eq!(payloads.next_payload().await?, Some(b"out/B1,Prime".to_vec()));
        assert_eq!(payloads.next_payload().await?, Some(b"out/B2,RRD".to_vec()));
        assert_eq!(payloads.next_payload().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn passes_invalid_utf8_through() -> TestResult<()> {
        let mut payloads = source(b"out/\xff,Prime\n");
        assert_eq!(payloads.next_payload().await?, Some(b"out/\xff,Prime".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn reads_from_file() -> TestResult<()> {
        let dir = tempfile::Builder::new().prefix("courier-source-").tempdir()?;
        let path = dir.path().join("events.txt");
        std::fs::write(&path, b"a/B1,rrd\n")?;
        let mut payloads = PayloadSource::open(Some(&path)).await?;
        assert_eq!(payloads.next_payload().await?, Some(b"a/B1,rrd".to_vec()));
        assert!(payloads.next_payload().await?.is_none());
        assert!(PayloadSource::open(Some(&dir.path().join("absent"))).await.is_err());
        Ok(())
    }
}
