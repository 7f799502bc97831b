//! A minimal blocking HTTP/1.1 GET client for file downloads.
//!
//! The transfer loop polls a cancellation predicate between reads, so an
//! abort requested from any thread takes effect within one read timeout.
//! Redirects are followed up to [`MAX_REDIRECT_HOPS`] hops and only within
//! the same scheme; without TLS support an upgrade target is reported as an
//! error rather than downgraded to plain TCP.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

/// Redirect chains longer than this are treated as an error.
pub(crate) const MAX_REDIRECT_HOPS: usize = 10;

/// How long a single read may block before the cancellation predicate is
/// polled again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Terminal outcome of one transfer attempt.
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    /// A 2xx response was fully written to the target file.
    Done,
    /// The server answered 404.
    NotFound,
    /// The cancellation predicate fired mid-transfer.
    Cancelled,
    /// Anything else: connect/read/write failures, bad responses,
    /// unsupported redirects.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpUrl {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) path: String,
}

impl HttpUrl {
    /// Parses an `http://host[:port][/path]` URL.
    pub(crate) fn parse(url: &str) -> Result<Self, String> {
        let Some(rest) = url.strip_prefix("http://") else {
            if url.starts_with("https://") {
                return Err(format!("https is not supported by this transport: {url}"));
            }
            return Err(format!("unsupported URL scheme: {url}"));
        };
        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(format!("URL has no host: {url}"));
        }
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in URL: {url}"))?;
                (host, port)
            }
            None => (authority, 80),
        };
        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }
}

struct Response {
    status: u16,
    reason: String,
    location: Option<String>,
    content_length: Option<u64>,
    chunked: bool,
    /// Body bytes that arrived in the same reads as the header block.
    body_prefix: Vec<u8>,
}

/// Downloads `url` into `file`, polling `cancelled` between reads.
///
/// The caller owns the file's fate: on every outcome other than `Done` the
/// partially written file must be removed by the caller.
pub(crate) fn fetch_to_file(
    url: &str,
    file_path: &Path,
    cancelled: &dyn Fn() -> bool,
) -> FetchOutcome {
    let mut current = url.to_owned();
    for _hop in 0..=MAX_REDIRECT_HOPS {
        let target = match HttpUrl::parse(&current) {
            Ok(target) => target,
            Err(message) => return FetchOutcome::Failed(message),
        };
        match fetch_one(&target, file_path, cancelled) {
            HopOutcome::Terminal(outcome) => return outcome,
            HopOutcome::Redirect(location) => {
                #[cfg(feature = "tracing-integration")]
                tracing::debug!(from = %current, to = %location, "following redirect");
                current = match resolve_redirect(&target, &location) {
                    Ok(next) => next,
                    Err(message) => return FetchOutcome::Failed(message),
                };
            }
        }
    }
    FetchOutcome::Failed(format!(
        "redirect chain exceeded {MAX_REDIRECT_HOPS} hops for {url}"
    ))
}

enum HopOutcome {
    Terminal(FetchOutcome),
    Redirect(String),
}

fn fetch_one(target: &HttpUrl, file_path: &Path, cancelled: &dyn Fn() -> bool) -> HopOutcome {
    let mut stream = match TcpStream::connect((target.host.as_str(), target.port)) {
        Ok(stream) => stream,
        Err(error) => {
            return HopOutcome::Terminal(FetchOutcome::Failed(format!(
                "connecting to {}:{} failed: {error}",
                target.host, target.port
            )));
        }
    };
    if let Err(error) = stream.set_read_timeout(Some(READ_POLL_INTERVAL)) {
        return HopOutcome::Terminal(FetchOutcome::Failed(format!(
            "configuring the connection failed: {error}"
        )));
    }

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nAccept: */*\r\n\r\n",
        target.path, target.host
    );
    if let Err(error) = stream.write_all(request.as_bytes()) {
        return HopOutcome::Terminal(FetchOutcome::Failed(format!(
            "sending the request failed: {error}"
        )));
    }

    let response = match read_response_head(&mut stream, cancelled) {
        Ok(Some(response)) => response,
        Ok(None) => return HopOutcome::Terminal(FetchOutcome::Cancelled),
        Err(message) => return HopOutcome::Terminal(FetchOutcome::Failed(message)),
    };

    match response.status {
        301 | 302 | 303 | 307 | 308 => match response.location {
            Some(location) => HopOutcome::Redirect(location),
            None => HopOutcome::Terminal(FetchOutcome::Failed(format!(
                "redirect status {} without a Location header",
                response.status
            ))),
        },
        404 => HopOutcome::Terminal(FetchOutcome::NotFound),
        200..=299 => {
            if response.chunked {
                return HopOutcome::Terminal(FetchOutcome::Failed(
                    "chunked transfer encoding is not supported by this transport".to_owned(),
                ));
            }
            HopOutcome::Terminal(stream_body(&mut stream, &response, file_path, cancelled))
        }
        status => HopOutcome::Terminal(FetchOutcome::Failed(format!(
            "server answered {status} {}",
            response.reason
        ))),
    }
}

fn resolve_redirect(from: &HttpUrl, location: &str) -> Result<String, String> {
    if location.starts_with("http://") {
        return Ok(location.to_owned());
    }
    if location.starts_with("https://") {
        return Err(format!(
            "redirect to {location} not followed: the target scheme is not reachable over this transport"
        ));
    }
    if location.starts_with('/') {
        return Ok(format!("http://{}:{}{}", from.host, from.port, location));
    }
    Err(format!("unsupported redirect target: {location}"))
}

fn read_response_head(
    stream: &mut TcpStream,
    cancelled: &dyn Fn() -> bool,
) -> Result<Option<Response>, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        match stream.read(&mut chunk) {
            Ok(0) => return Err("connection closed before the response head".to_owned()),
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
            Err(error) if is_read_poll(&error) => {
                if cancelled() {
                    return Ok(None);
                }
            }
            Err(error) => return Err(format!("reading the response head failed: {error}")),
        }
    };

    let head = std::str::from_utf8(&buffer[..header_end])
        .map_err(|_| "response head is not valid UTF-8".to_owned())?;
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut status_parts = status_line.splitn(3, ' ');
    let version = status_parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(format!("unsupported response version: {status_line}"));
    }
    let status = status_parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| format!("malformed status line: {status_line}"))?;
    let reason = status_parts.next().unwrap_or_default().to_owned();

    let mut location = None;
    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("location") {
            location = Some(value.to_owned());
        } else if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.eq_ignore_ascii_case("chunked");
        }
    }

    Ok(Some(Response {
        status,
        reason,
        location,
        content_length,
        chunked,
        body_prefix: buffer[header_end + 4..].to_vec(),
    }))
}

fn stream_body(
    stream: &mut TcpStream,
    response: &Response,
    file_path: &Path,
    cancelled: &dyn Fn() -> bool,
) -> FetchOutcome {
    let mut file = match File::create(file_path) {
        Ok(file) => file,
        Err(error) => {
            return FetchOutcome::Failed(format!(
                "creating {} failed: {error}",
                file_path.display()
            ));
        }
    };

    let mut written = 0_u64;
    if !response.body_prefix.is_empty() {
        if let Err(error) = file.write_all(&response.body_prefix) {
            return FetchOutcome::Failed(format!("writing the download failed: {error}"));
        }
        written += response.body_prefix.len() as u64;
    }

    let mut chunk = [0_u8; 16 * 1024];
    loop {
        if let Some(expected) = response.content_length {
            if written >= expected {
                break;
            }
        }
        if cancelled() {
            return FetchOutcome::Cancelled;
        }
        match stream.read(&mut chunk) {
            Ok(0) => {
                // Without a Content-Length the peer closing the connection
                // ends the body.
                match response.content_length {
                    Some(expected) if written < expected => {
                        return FetchOutcome::Failed(format!(
                            "connection closed after {written} of {expected} bytes"
                        ));
                    }
                    _ => break,
                }
            }
            Ok(read) => {
                if let Err(error) = file.write_all(&chunk[..read]) {
                    return FetchOutcome::Failed(format!("writing the download failed: {error}"));
                }
                written += read as u64;
            }
            Err(error) if is_read_poll(&error) => {}
            Err(error) => {
                return FetchOutcome::Failed(format!("reading the download failed: {error}"));
            }
        }
    }

    if let Err(error) = file.sync_all() {
        return FetchOutcome::Failed(format!("flushing the download failed: {error}"));
    }
    FetchOutcome::Done
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
}

fn is_read_poll(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        let url = HttpUrl::parse("http://example.com:8080/files/a.bin").expect("valid URL");
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 8080);
        assert_eq!(url.path, "/files/a.bin");
    }

    #[test]
    fn defaults_port_and_path() {
        let url = HttpUrl::parse("http://example.com").expect("valid URL");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/");
    }

    #[test]
    fn rejects_https_and_unknown_schemes() {
        assert!(HttpUrl::parse("https://example.com/a").is_err());
        assert!(HttpUrl::parse("ftp://example.com/a").is_err());
    }

    #[test]
    fn relative_redirects_stay_on_the_same_authority() {
        let from = HttpUrl::parse("http://example.com:81/a").expect("valid URL");
        assert_eq!(
            resolve_redirect(&from, "/b").expect("resolvable"),
            "http://example.com:81/b"
        );
        assert!(resolve_redirect(&from, "https://example.com/b").is_err());
    }

    #[test]
    fn finds_the_header_terminator() {
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n\r\nbody"), Some(15));
        assert_eq!(find_header_end(b"partial\r\n"), None);
    }
}
