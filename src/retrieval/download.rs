//! Resumable HTTP downloads
//!
//! Archives are streamed to `<file>.partial` and renamed into place once the
//! transfer completes, so an interrupted download never looks like a
//! finished one. When a partial file exists the next attempt asks the server
//! for the remaining range; servers that ignore the `Range` header get a
//! fresh download.
//!
//! Mirrors are tried in declared order. There is no retry loop beyond that:
//! a failed fetch is reported and the command can be re-run.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::RANGE;
use reqwest::StatusCode;

use crate::config::ArchiveDescriptor;
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the in-progress download for `dest`.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

/// HTTP downloader shared by all archives of one retrieval run
pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    /// Build a downloader. `ssl_verify = false` accepts any certificate.
    pub fn new(ssl_verify: bool, show_progress: bool) -> Result<Self> {
        if !ssl_verify {
            warn!("SSL certificate verification is disabled");
        }
        let client = Client::builder()
            .user_agent(concat!("bundlekit/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Download an archive to `dest`, trying each of its URLs in turn.
    pub fn fetch(&self, archive: &ArchiveDescriptor, dest: &Path) -> Result<()> {
        let mut last_error = None;
        for url in &archive.urls {
            info!("Downloading {} from {}", archive.name, url);
            match self.fetch_url(url, dest) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Download of {} from {} failed: {}", archive.name, url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Network {
            url: String::new(),
            message: format!("archive \"{}\" declares no URL", archive.name),
        }))
    }

    /// Download a single URL to `dest` via its partial file.
    pub fn fetch_url(&self, url: &str, dest: &Path) -> Result<()> {
        let partial = partial_path(dest);
        self.transfer(url, &partial, true)?;
        fs::rename(&partial, dest)?;
        Ok(())
    }

    fn transfer(&self, url: &str, partial: &Path, allow_resume: bool) -> Result<()> {
        let network_error = |message: String| Error::Network {
            url: url.to_string(),
            message,
        };

        let resume_from = if allow_resume {
            fs::metadata(partial).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        let mut request = self.client.get(url);
        if resume_from > 0 {
            info!("Resuming {} from byte {}", url, resume_from);
            request = request.header(RANGE, format!("bytes={}-", resume_from));
        }
        let mut response = request.send().map_err(|e| network_error(e.to_string()))?;

        let status = response.status();
        if resume_from > 0 && status == StatusCode::RANGE_NOT_SATISFIABLE {
            warn!("Server rejected resume of {}, starting over", url);
            fs::remove_file(partial)?;
            return self.transfer(url, partial, false);
        }
        if !status.is_success() {
            return Err(network_error(format!(
                "HTTP {}",
                status.canonical_reason().map_or_else(
                    || status.as_u16().to_string(),
                    |reason| format!("{} {}", status.as_u16(), reason)
                )
            )));
        }

        let resumed = resume_from > 0 && status == StatusCode::PARTIAL_CONTENT;
        let (file, start) = if resumed {
            (OpenOptions::new().append(true).open(partial)?, resume_from)
        } else {
            (File::create(partial)?, 0)
        };
        let total = response.content_length().map(|len| len + start);

        let progress = ClearOnDrop(self.progress_bar(total));
        progress.0.set_position(start);

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = start;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|e| network_error(format!("read failed after {} bytes: {}", received, e)))?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read])?;
            received += read as u64;
            progress.0.inc(read as u64);
        }
        writer.flush()?;
        drop(progress);

        if let Some(total) = total {
            if received != total {
                return Err(network_error(format!(
                    "incomplete download: expected {} bytes, got {}",
                    total, received
                )));
            }
        }
        Ok(())
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        }
    }
}

/// Clears the wrapped progress bar however the transfer ends.
struct ClearOnDrop(ProgressBar);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    /// Serve `body` once over HTTP/1.1 and report the request's Range header.
    fn serve_once(body: &'static [u8]) -> (String, thread::JoinHandle<Option<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/archive.tar.gz", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut range = None;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("range:") {
                    range = Some(value.trim().to_string());
                }
            }

            let mut stream = stream;
            let (status, payload): (&str, &[u8]) = match range
                .as_deref()
                .and_then(|r| r.strip_prefix("bytes="))
                .and_then(|r| r.trim_end_matches('-').parse::<usize>().ok())
            {
                Some(start) => ("206 Partial Content", &body[start..]),
                None => ("200 OK", body),
            };
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                payload.len()
            )
            .unwrap();
            stream.write_all(payload).unwrap();
            stream.flush().unwrap();
            range
        });
        (url, handle)
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("downloads/src.tar.xz")),
            PathBuf::from("downloads/src.tar.xz.partial")
        );
    }

    #[test]
    fn test_fetch_url_downloads_and_commits() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.tar.gz");
        let (url, server) = serve_once(b"0123456789");

        let downloader = Downloader::new(true, false).unwrap();
        downloader.fetch_url(&url, &dest).unwrap();

        assert_eq!(server.join().unwrap(), None);
        assert_eq!(fs::read(&dest).unwrap(), b"0123456789");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_fetch_url_resumes_partial_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.tar.gz");
        fs::write(partial_path(&dest), b"01234").unwrap();
        let (url, server) = serve_once(b"0123456789");

        let downloader = Downloader::new(true, false).unwrap();
        downloader.fetch_url(&url, &dest).unwrap();

        assert_eq!(server.join().unwrap().as_deref(), Some("bytes=5-"));
        assert_eq!(fs::read(&dest).unwrap(), b"0123456789");
    }

    #[test]
    fn test_fetch_unreachable_url_is_network_error() {
        let temp = TempDir::new().unwrap();
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{}/missing.tar", port);

        let downloader = Downloader::new(true, false).unwrap();
        let result = downloader.fetch_url(&url, &temp.path().join("missing.tar"));
        assert!(matches!(result, Err(Error::Network { .. })));
        assert!(!temp.path().join("missing.tar").exists());
    }

    #[test]
    fn test_progress_bar_cleared_on_failed_transfer() {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden());
        let failed = || -> Result<()> {
            let progress = ClearOnDrop(bar.clone());
            progress.0.inc(10);
            Err(Error::Network {
                url: "http://mirror.example/src.tar.xz".to_string(),
                message: "connection reset".to_string(),
            })
        };

        assert!(failed().is_err());
        assert!(bar.is_finished());
    }

    #[test]
    fn test_fetch_url_truncated_body_is_network_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.tar.gz");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/archive.tar.gz", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n01234")
                .unwrap();
        });

        let downloader = Downloader::new(true, true).unwrap();
        let result = downloader.fetch_url(&url, &dest);
        server.join().unwrap();

        assert!(matches!(result, Err(Error::Network { .. })));
        assert!(!dest.exists());
    }
}
