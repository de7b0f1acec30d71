//! Remote document download with byte-level progress.
//!
//! Fetches a document over HTTP(S) into a local file, reading the body in
//! fixed-size chunks and reporting progress after every chunk. There is no
//! retry and no resumption: any failure aborts the transfer and removes the
//! partial file. Bodies are staged in a temporary file beside the destination.

use pdf_viewer_scheduler::CancellationToken;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Default read size for streaming the response body
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("unsupported URL '{0}': only http and https are supported")]
    UnsupportedUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download cancelled")]
    Cancelled,
}

/// Progress of a running download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    /// Percentage of the declared content length received, 0..=100
    Percent(u8),
    /// The server did not declare a usable content length
    Indeterminate { bytes_received: u64 },
}

/// Progress after `received` bytes of a body declared as `total` bytes long.
///
/// The percentage is truncated toward zero and clamped to 100. A missing or
/// zero length yields [`DownloadProgress::Indeterminate`].
pub fn progress_for(received: u64, total: Option<u64>) -> DownloadProgress {
    match total {
        Some(total) if total > 0 => {
            let percent = received.saturating_mul(100) / total;
            DownloadProgress::Percent(percent.min(100) as u8)
        }
        _ => DownloadProgress::Indeterminate {
            bytes_received: received,
        },
    }
}

/// Settings for the HTTP agent and the body stream
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(30),
            user_agent: format!("pdf-viewer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
    pub content_length: Option<u64>,
}

pub struct Downloader {
    agent: ureq::Agent,
    chunk_size: usize,
}

impl Downloader {
    pub fn new(config: &DownloadConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .user_agent(&config.user_agent)
            .build();

        Self {
            agent,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Download `url` into `dest`, replacing any file already there.
    ///
    /// `on_progress` is called once per chunk written. The token is checked
    /// between chunks; a cancelled transfer returns [`DownloadError::Cancelled`].
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        token: &CancellationToken,
        on_progress: impl FnMut(DownloadProgress),
    ) -> Result<Download, DownloadError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DownloadError::UnsupportedUrl(url.to_string()));
        }

        log::debug!("downloading {} to {}", url, dest.display());

        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => DownloadError::Status(code),
            ureq::Error::Transport(transport) => DownloadError::Network(transport.to_string()),
        })?;

        let content_length = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|&length| length > 0);

        let mut reader = response.into_reader();
        let bytes = stream_to_file(
            &mut reader,
            content_length,
            dest,
            self.chunk_size,
            token,
            on_progress,
        )?;

        log::info!("downloaded {} bytes from {}", bytes, url);

        Ok(Download {
            path: dest.to_path_buf(),
            bytes,
            content_length,
        })
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(&DownloadConfig::default())
    }
}

/// Copy `reader` into `dest` in `chunk_size` reads, reporting progress.
///
/// Any existing file at `dest` is removed first. The body is written to a
/// temporary file next to `dest` and renamed onto it only once complete, so
/// concurrent transfers to the same path never remove each other's output.
/// On error or cancellation only the temporary file is removed. Returns the
/// byte count.
pub fn stream_to_file<R: Read + ?Sized>(
    reader: &mut R,
    total: Option<u64>,
    dest: &Path,
    chunk_size: usize,
    token: &CancellationToken,
    mut on_progress: impl FnMut(DownloadProgress),
) -> Result<u64, DownloadError> {
    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    let dir = match dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut partial = NamedTempFile::new_in(dir)?;
    let received = copy_chunks(
        reader,
        total,
        partial.as_file_mut(),
        chunk_size.max(1),
        token,
        &mut on_progress,
    )?;

    if token.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }
    partial.persist(dest).map_err(|err| DownloadError::Io(err.error))?;
    Ok(received)
}

fn copy_chunks<R: Read + ?Sized>(
    reader: &mut R,
    total: Option<u64>,
    out: &mut File,
    chunk_size: usize,
    token: &CancellationToken,
    on_progress: &mut dyn FnMut(DownloadProgress),
) -> Result<u64, DownloadError> {
    let mut buffer = vec![0u8; chunk_size];
    let mut received: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        out.write_all(&buffer[..count])?;
        received += count as u64;
        on_progress(progress_for(received, total));
    }

    out.flush()?;
    Ok(received)
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    //! Loopback HTTP responders for tests.

    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single HTTP response on 127.0.0.1 and return its URL
    ///
    /// `content_length` controls the declared length header; `None` omits it
    /// and the body is terminated by closing the connection.
    pub fn serve_once(status: u16, body: Vec<u8>, content_length: Option<u64>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");

        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                if line == "\r\n" || line == "\n" {
                    break;
                }
                line.clear();
            }

            let mut stream = reader.into_inner();
            let mut head = format!("HTTP/1.1 {status} Status\r\nConnection: close\r\n");
            if let Some(length) = content_length {
                head.push_str(&format!("Content-Length: {length}\r\n"));
            }
            head.push_str("\r\n");

            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        });

        format!("http://{addr}/document.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "connection reset"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }
    }

    fn percents(progress: &[DownloadProgress]) -> Vec<u8> {
        progress
            .iter()
            .map(|p| match p {
                DownloadProgress::Percent(value) => *value,
                other => panic!("expected a percentage, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn progress_for_known_length() {
        assert_eq!(progress_for(0, Some(100)), DownloadProgress::Percent(0));
        assert_eq!(progress_for(8_192, Some(100_000)), DownloadProgress::Percent(8));
        assert_eq!(progress_for(100_000, Some(100_000)), DownloadProgress::Percent(100));
    }

    #[test]
    fn progress_for_clamps_overshoot() {
        assert_eq!(progress_for(150, Some(100)), DownloadProgress::Percent(100));
    }

    #[test]
    fn progress_for_unknown_length_is_indeterminate() {
        assert_eq!(
            progress_for(42, None),
            DownloadProgress::Indeterminate { bytes_received: 42 }
        );
        assert_eq!(
            progress_for(42, Some(0)),
            DownloadProgress::Indeterminate { bytes_received: 42 }
        );
    }

    #[test]
    fn stream_reports_non_decreasing_progress_ending_at_100() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let body = vec![7u8; 100_000];
        let mut progress = Vec::new();

        let bytes = stream_to_file(
            &mut Cursor::new(body.clone()),
            Some(100_000),
            &dest,
            DEFAULT_CHUNK_SIZE,
            &CancellationToken::new(),
            |p| progress.push(p),
        )
        .unwrap();

        assert_eq!(bytes, 100_000);
        assert_eq!(fs::read(&dest).unwrap(), body);

        let values = percents(&progress);
        assert_eq!(values.len(), 13);
        assert_eq!(&values[..3], &[8, 16, 24]);
        assert_eq!(values[11], 98);
        assert_eq!(values.last(), Some(&100));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn stream_without_length_reports_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let mut progress = Vec::new();

        stream_to_file(
            &mut Cursor::new(vec![0u8; 20]),
            None,
            &dest,
            8,
            &CancellationToken::new(),
            |p| progress.push(p),
        )
        .unwrap();

        assert_eq!(
            progress,
            vec![
                DownloadProgress::Indeterminate { bytes_received: 8 },
                DownloadProgress::Indeterminate { bytes_received: 16 },
                DownloadProgress::Indeterminate { bytes_received: 20 },
            ]
        );
    }

    #[test]
    fn stream_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        fs::write(&dest, vec![1u8; 4096]).unwrap();

        stream_to_file(
            &mut Cursor::new(b"new".to_vec()),
            Some(3),
            &dest,
            DEFAULT_CHUNK_SIZE,
            &CancellationToken::new(),
            |_| {},
        )
        .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn stream_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/cache/out.pdf");

        stream_to_file(
            &mut Cursor::new(b"abc".to_vec()),
            Some(3),
            &dest,
            DEFAULT_CHUNK_SIZE,
            &CancellationToken::new(),
            |_| {},
        )
        .unwrap();

        assert!(dest.exists());
    }

    #[test]
    fn cancelled_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let token = CancellationToken::new();
        let mut calls = 0;

        let err = stream_to_file(
            &mut Cursor::new(vec![0u8; 64]),
            Some(64),
            &dest,
            8,
            &token,
            |_| {
                calls += 1;
                token.cancel();
            },
        )
        .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled));
        assert_eq!(calls, 1);
        assert!(!dest.exists());
    }

    #[test]
    fn cancelled_stream_keeps_file_written_by_another_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let stale = CancellationToken::new();
        let mut stale_reader = Cursor::new(vec![9u8; 64]);

        // The newer transfer finishes while the older one is mid-stream.
        let err = stream_to_file(&mut stale_reader, Some(64), &dest, 8, &stale, |_| {
            if !dest.exists() {
                stream_to_file(
                    &mut Cursor::new(b"fresh".to_vec()),
                    Some(5),
                    &dest,
                    DEFAULT_CHUNK_SIZE,
                    &CancellationToken::new(),
                    |_| {},
                )
                .unwrap();
                stale.cancel();
            }
        })
        .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled));
        assert_eq!(fs::read(&dest).unwrap(), b"fresh");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn read_failure_aborts_and_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let mut progress = Vec::new();

        let err = stream_to_file(
            &mut FailingReader { remaining: 16 },
            Some(64),
            &dest,
            8,
            &CancellationToken::new(),
            |p| progress.push(p),
        )
        .unwrap_err();

        assert!(matches!(err, DownloadError::Io(_)));
        assert_eq!(percents(&progress), vec![12, 25]);
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn download_over_http() {
        let body = vec![3u8; 20_000];
        let url = testing::serve_once(200, body.clone(), Some(20_000));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("downloaded_pdf.pdf");
        let mut progress = Vec::new();

        let download = Downloader::default()
            .download(&url, &dest, &CancellationToken::new(), |p| progress.push(p))
            .unwrap();

        assert_eq!(download.bytes, 20_000);
        assert_eq!(download.content_length, Some(20_000));
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert_eq!(progress.last(), Some(&DownloadProgress::Percent(100)));
    }

    #[test]
    fn download_without_content_length_is_indeterminate() {
        let url = testing::serve_once(200, vec![1u8; 100], None);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let mut progress = Vec::new();

        let download = Downloader::default()
            .download(&url, &dest, &CancellationToken::new(), |p| progress.push(p))
            .unwrap();

        assert_eq!(download.bytes, 100);
        assert!(progress
            .iter()
            .all(|p| matches!(p, DownloadProgress::Indeterminate { .. })));
    }

    #[test]
    fn download_http_error_status() {
        let url = testing::serve_once(404, b"missing".to_vec(), Some(7));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");

        let err = Downloader::default()
            .download(&url, &dest, &CancellationToken::new(), |_| {})
            .unwrap_err();

        assert!(matches!(err, DownloadError::Status(404)));
        assert!(!dest.exists());
    }

    #[test]
    fn download_rejects_non_http_urls() {
        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::default()
            .download(
                "ftp://example.invalid/doc.pdf",
                &dir.path().join("out.pdf"),
                &CancellationToken::new(),
                |_| {},
            )
            .unwrap_err();

        assert!(matches!(err, DownloadError::UnsupportedUrl(_)));
    }

    #[test]
    fn config_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert!(config.user_agent.starts_with("pdf-viewer/"));
    }
}
